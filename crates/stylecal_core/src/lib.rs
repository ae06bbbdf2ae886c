pub mod calendar;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod jobs;
pub mod matcher;
pub mod ports;
pub mod rules;
pub mod tokens;

pub use calendar::{CalendarService, CalendarSettings, SyncReport, SyncWriter, UpcomingFilter};
pub use domain::{
    AuthSession, Category, ClassifiedEvent, Credential, EventRecommendation, ExternalEvent, Keyword,
    Product, Rule, RuleWithKeywords, SyncedEvent, User, UserCredentials,
};
pub use error::{CalendarError, JobError, RuleAdminError};
pub use ports::{
    AccountStore, CalendarApi, CatalogRefresher, CatalogStore, CredentialStore, EventStore,
    LeaseStore, OAuthProvider, PortError, PortResult, ProviderError, RuleStore,
};
pub use rules::{RuleAdmin, RuleSnapshot};
pub use tokens::TokenRefresher;
