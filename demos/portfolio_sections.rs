//! Renders the portfolio content sections in a terminal.
//!
//! A stand-in for the site's section views: each section declares its
//! resource, renders a skeleton while loading, an error panel on failure,
//! and the list on success. Run against a live content API:
//!
//! ```text
//! FOLIO_API_URL=http://localhost:3001 cargo run --example portfolio_sections
//! ```
//!
//! Set `FOLIO_SEND_TEST_MAIL=1` to also exercise the contact mutation.

use folio::api::{self, Education, Experience, MailPayload, Paginated, Project};
use folio::cache::{CacheStore, FetchStatus};
use folio::client::{ClientConfig, ResourceClient};
use folio::mutation::{MutationCallbacks, MutationEngine};
use folio::query::{QueryEngine, QuerySnapshot};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let client = ResourceClient::new(ClientConfig::from_env()?);
    let store = CacheStore::new();
    let queries = QueryEngine::new(client.clone(), store);
    let mutations = MutationEngine::new(client);

    let mut experience = queries.query(api::experience_page(api::DEFAULT_PAGE, api::DEFAULT_LIMIT));
    let mut education = queries.query(api::education_page(api::DEFAULT_PAGE, api::DEFAULT_LIMIT));
    let mut projects = queries.query(api::projects_page(api::DEFAULT_PAGE, api::DEFAULT_LIMIT));

    // First paint: everything is still loading, so the skeletons show.
    render_section::<Experience>("Experience", &experience.snapshot(), |e| {
        format!("{} @ {} ({} – {})", e.position, e.company, e.start_date, e.end_date)
    });

    let experience_snapshot = experience.settled().await;
    render_section::<Experience>("Experience", &experience_snapshot, |e| {
        format!("{} @ {} ({} – {})", e.position, e.company, e.start_date, e.end_date)
    });

    let education_snapshot = education.settled().await;
    render_section::<Education>("Education", &education_snapshot, |e| {
        format!("{}, {} (GPA {})", e.degree, e.institution, e.gpa)
    });

    let projects_snapshot = projects.settled().await;
    render_section::<Project>("Projects", &projects_snapshot, |p| {
        format!("{} — {}", p.title, p.subtitle)
    });

    // Selecting a project (as a click would) enables the dependent detail query.
    let selected = projects_snapshot
        .data_as::<Paginated<Project>>()
        .ok()
        .flatten()
        .and_then(|page| page.data.first().map(|p| p.id.clone()));

    let mut detail = api::project_detail(&queries, selected.as_deref());
    println!("\n== Project detail ==");
    if detail.is_enabled() {
        let snapshot = detail.settled().await;
        match snapshot.data_as::<Project>() {
            Ok(Some(project)) => {
                println!("  {}", project.title);
                println!("  {}", project.description);
                println!("  demo: {}  code: {}", project.demo_url, project.github_url);
            }
            Ok(None) => println!("  error: {}", error_text(&snapshot)),
            Err(e) => println!("  error: malformed project payload ({e})"),
        }
    } else {
        println!("  no project selected — query stays idle");
    }

    if std::env::var("FOLIO_SEND_TEST_MAIL").is_ok() {
        send_contact_mail(&mutations).await;
    }

    Ok(())
}

/// Renders one collection section from its query snapshot.
fn render_section<T>(title: &str, snapshot: &QuerySnapshot, line: impl Fn(&T) -> String)
where
    T: serde::de::DeserializeOwned,
{
    println!("\n== {title} ==");
    match snapshot.status() {
        FetchStatus::Idle | FetchStatus::Loading => println!("  ░░░░░░░░░░  ░░░░░░"),
        FetchStatus::Error => println!("  error: {}", error_text(snapshot)),
        FetchStatus::Success => match snapshot.data_as::<Paginated<T>>() {
            Ok(Some(page)) => {
                for item in &page.data {
                    println!("  • {}", line(item));
                }
                println!(
                    "  page {}/{} — {} total",
                    page.meta.page, page.meta.total_pages, page.meta.total
                );
            }
            Ok(None) => println!("  (empty)"),
            Err(e) => println!("  error: malformed payload ({e})"),
        },
    }
}

fn error_text(snapshot: &QuerySnapshot) -> String {
    snapshot
        .error()
        .map(|e| e.message())
        .unwrap_or_else(|| "unknown error".to_owned())
}

/// Drives the contact form flow: submit once, disabled while pending, then
/// show the dialog the callbacks would open.
async fn send_contact_mail(mutations: &MutationEngine) {
    let send = mutations.mutation(api::send_mail());
    let payload = MailPayload {
        name: "Portfolio Demo".to_owned(),
        email: "demo@example.com".to_owned(),
        subject: "Test message".to_owned(),
        message: "Sent by the portfolio_sections demo.".to_owned(),
    };

    let (tx, mut rx) = tokio::sync::mpsc::channel::<Result<(), String>>(1);
    let success_tx = tx.clone();
    send.trigger(
        &payload,
        MutationCallbacks::new()
            .on_success(move |_| {
                let _ = success_tx.try_send(Ok(()));
            })
            .on_error(move |error| {
                let _ = tx.try_send(Err(error.message()));
            }),
    );

    println!("\n== Contact ==");
    println!("  sending… (submit disabled: {})", send.is_pending());
    match rx.recv().await {
        Some(Ok(())) => {
            println!("  dialog: Your message has been sent successfully! I'll get back to you soon.")
        }
        Some(Err(message)) => println!("  dialog: {message}"),
        None => println!("  dialog: Failed to send message. Please try again later."),
    }
}
