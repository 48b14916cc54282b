use std::sync::Arc;

use anyhow::Result;
use taskx_core::calendar::{CalendarApi, CalendarConnector, OAuthFlow};
use taskx_core::config::TaskxConfig;
use taskx_core::identity::IdentityVerifier;
use taskx_core::reminder::{Mailer, ReminderDispatcher, ReminderWindow, SmsSender};
use taskx_core::store::{DocumentStore, UserStore};
use taskx_core::tasks::TaskService;
use taskx_notify::{SmtpMailer, TwilioSms};
use taskx_provider_google::{GoogleCalendar, IdentityToolkit};

/// The outside services the app talks to.
pub struct Providers {
    pub identity: Arc<dyn IdentityVerifier>,
    pub oauth: Arc<dyn OAuthFlow>,
    pub calendar: Arc<dyn CalendarApi>,
    pub mailer: Arc<dyn Mailer>,
    pub sms: Arc<dyn SmsSender>,
}

/// Shared application state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub connector: Arc<CalendarConnector>,
    pub tasks: Arc<TaskService>,
    pub dispatcher: Arc<ReminderDispatcher>,
    /// Where the OAuth callback sends the browser afterwards.
    pub app_url: String,
}

impl AppState {
    pub fn new(store: Arc<DocumentStore>, providers: Providers, config: &TaskxConfig) -> Result<Self> {
        let connector = Arc::new(CalendarConnector::new(
            store.clone(),
            providers.oauth,
            providers.calendar,
            config.calendar.clone(),
        ));

        let tasks = Arc::new(TaskService::new(store.clone(), connector.clone()));

        let dispatcher = Arc::new(ReminderDispatcher::new(
            store.clone(),
            store.clone(),
            providers.mailer,
            providers.sms,
            ReminderWindow::from_config(&config.reminders),
            config.reminders.display_tz()?,
        ));

        Ok(AppState {
            users: store,
            identity: providers.identity,
            connector,
            tasks,
            dispatcher,
            app_url: config.app_url.trim_end_matches('/').to_string(),
        })
    }

    /// Wire up the Google, SMTP and Twilio clients and open the document store.
    pub async fn from_config(config: &TaskxConfig) -> Result<Self> {
        let data_path = config.data_path();
        let store = Arc::new(DocumentStore::open(&data_path).await?);
        tracing::info!(path = %data_path.display(), "Opened document store");

        let google = Arc::new(GoogleCalendar::from_config(
            &config.google,
            config.redirect_uri(),
        ));

        let providers = Providers {
            identity: Arc::new(IdentityToolkit::new(&config.google.api_key)),
            oauth: google.clone(),
            calendar: google,
            mailer: Arc::new(SmtpMailer::from_config(&config.smtp)?),
            sms: Arc::new(TwilioSms::from_config(&config.twilio)),
        };

        Self::new(store, providers, config)
    }
}
