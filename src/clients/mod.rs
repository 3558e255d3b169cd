//! Outbound collaborators: website scraping, draft generation, delivery,
//! and channel notification. Each is a trait the pipeline calls through,
//! with an HTTP implementation for the real provider.

pub mod drafter;
pub mod mailer;
pub mod notifier;
pub mod scraper;
