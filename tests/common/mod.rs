// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use gym_buddy::bot::{CallbackQuery, ChatTransport, InlineKeyboard, Message};
use gym_buddy::config::Config;
use gym_buddy::db::{FirestoreDb, MemoryStore};
use gym_buddy::error::AppError;
use gym_buddy::models::{Credential, Exercise, SessionEntry};
use gym_buddy::routes::create_router;
use gym_buddy::services::{
    ExerciseCatalog, KmsService, OAuthProvider, SheetsProvider, TokenGrant,
};
use gym_buddy::{AppState, Collaborators};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A well-formed spreadsheet ID.
#[allow(dead_code)]
pub const SHEET_ID: &str = "1BxiMVs0XRA5nFMdKvBdBZjgmUUqptlbs74OgvE2upms";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// How a fake provider call should end.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeed,
    Transient,
    Rejected,
}

impl Outcome {
    fn into_result(self, what: &str) -> Result<(), AppError> {
        match self {
            Outcome::Succeed => Ok(()),
            Outcome::Transient => Err(AppError::ExternalTransient(format!("{} timed out", what))),
            Outcome::Rejected => Err(AppError::ExternalRejected("invalid_grant".to_string())),
        }
    }
}

/// OAuth provider that counts calls and never touches the network.
#[allow(dead_code)]
pub struct FakeOAuth {
    pub exchanges: AtomicUsize,
    pub refreshes: AtomicUsize,
    pub exchange_outcome: Mutex<Outcome>,
    pub refresh_outcome: Mutex<Outcome>,
    /// Held inside `refresh` to widen race windows.
    pub refresh_delay: Mutex<Duration>,
}

#[allow(dead_code)]
impl FakeOAuth {
    pub fn new() -> Self {
        Self {
            exchanges: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            exchange_outcome: Mutex::new(Outcome::Succeed),
            refresh_outcome: Mutex::new(Outcome::Succeed),
            refresh_delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn set_exchange(&self, outcome: Outcome) {
        *self.exchange_outcome.lock().unwrap() = outcome;
    }

    pub fn set_refresh(&self, outcome: Outcome) {
        *self.refresh_outcome.lock().unwrap() = outcome;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl OAuthProvider for FakeOAuth {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://accounts.google.test/o/oauth2/auth?state={}", state)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        let outcome = *self.exchange_outcome.lock().unwrap();
        outcome.into_result("exchange")?;

        Ok(TokenGrant {
            access_token: format!("access-{}", code),
            refresh_token: Some(format!("refresh-{}", code)),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, AppError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *self.refresh_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let outcome = *self.refresh_outcome.lock().unwrap();
        outcome.into_result("refresh")?;

        Ok(TokenGrant {
            access_token: format!("refreshed-{}", n),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_in: 3600,
        })
    }
}

/// Sheets provider that records appended rows.
#[allow(dead_code)]
pub struct FakeSheets {
    pub creates: AtomicUsize,
    pub create_outcome: Mutex<Outcome>,
    pub append_outcome: Mutex<Outcome>,
    /// (access token, sheet ID, rows) per append
    pub appended: Mutex<Vec<(String, String, Vec<Vec<String>>)>>,
}

#[allow(dead_code)]
impl FakeSheets {
    pub fn new() -> Self {
        Self {
            creates: AtomicUsize::new(0),
            create_outcome: Mutex::new(Outcome::Succeed),
            append_outcome: Mutex::new(Outcome::Succeed),
            appended: Mutex::new(Vec::new()),
        }
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn set_create(&self, outcome: Outcome) {
        *self.create_outcome.lock().unwrap() = outcome;
    }

    pub fn set_append(&self, outcome: Outcome) {
        *self.append_outcome.lock().unwrap() = outcome;
    }

    pub fn appended(&self) -> Vec<(String, String, Vec<Vec<String>>)> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl SheetsProvider for FakeSheets {
    async fn create_workout_sheet(&self, _access_token: &str) -> Result<String, AppError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let outcome = *self.create_outcome.lock().unwrap();
        outcome.into_result("create")?;
        Ok(SHEET_ID.to_string())
    }

    async fn append_rows(
        &self,
        access_token: &str,
        sheet_id: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), AppError> {
        let outcome = *self.append_outcome.lock().unwrap();
        outcome.into_result("append")?;
        self.appended.lock().unwrap().push((
            access_token.to_string(),
            sheet_id.to_string(),
            rows,
        ));
        Ok(())
    }
}

/// One outbound chat message.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Sent {
    pub chat_id: i64,
    pub message_id: Option<i64>,
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
}

/// Chat transport that records everything instead of calling Telegram.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<Sent>>,
    pub edited: Mutex<Vec<Sent>>,
    /// (callback ID, toast)
    pub answered: Mutex<Vec<(String, Option<String>)>>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn edited(&self) -> Vec<Sent> {
        self.edited.lock().unwrap().clone()
    }

    pub fn answered(&self) -> Vec<(String, Option<String>)> {
        self.answered.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        self.edited.lock().unwrap().clear();
        self.answered.lock().unwrap().clear();
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(Sent {
            chat_id,
            message_id: None,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), AppError> {
        self.edited.lock().unwrap().push(Sent {
            chat_id,
            message_id: Some(message_id),
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), AppError> {
        self.answered
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(String::from)));
        Ok(())
    }
}

#[allow(dead_code)]
pub fn exercise(id: &str, name: &str) -> Exercise {
    let mut exercise = Exercise::from_entry(&SessionEntry {
        exercise_id: id.to_string(),
        name: name.to_string(),
        category: "strength".to_string(),
    });
    exercise.level = "beginner".to_string();
    exercise.instructions = vec![format!("Do the {}.", name.to_lowercase())];
    exercise
}

/// Four-exercise catalog used across the tests.
#[allow(dead_code)]
pub fn test_catalog() -> ExerciseCatalog {
    ExerciseCatalog::from_exercises(vec![
        exercise("Barbell_Squat", "Barbell Squat"),
        exercise("Bench_Press", "Bench Press"),
        exercise("Bent_Over_Row", "Bent Over Row"),
        exercise("Deadlift", "Deadlift"),
    ])
}

/// A fully wired app over the in-memory store and fake providers.
#[allow(dead_code)]
pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: MemoryStore,
    pub oauth: Arc<FakeOAuth>,
    pub sheets: Arc<FakeSheets>,
    pub transport: Arc<RecordingTransport>,
}

#[allow(dead_code)]
impl TestApp {
    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }

    /// Store a credential directly, bypassing the OAuth flow.
    pub async fn seed_credential(
        &self,
        user_id: u64,
        expires_in: chrono::Duration,
        resource_id: Option<&str>,
    ) {
        let credential = Credential {
            access_token: "seed-access".to_string(),
            refresh_token: "seed-refresh".to_string(),
            token_type: "Bearer".to_string(),
            expiry: chrono::Utc::now() + expires_in,
            resource_id: resource_id.map(String::from),
        };
        self.state
            .connection
            .tokens()
            .store(user_id, &credential)
            .await
            .expect("seed credential");
    }
}

#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> TestApp {
    let store = MemoryStore::new();
    let oauth = Arc::new(FakeOAuth::new());
    let sheets = Arc::new(FakeSheets::new());
    let transport = Arc::new(RecordingTransport::default());

    let state = Arc::new(AppState::new(
        config,
        Collaborators {
            store: Arc::new(store.clone()),
            catalog: Arc::new(test_catalog()),
            kms: KmsService::local(),
            oauth: oauth.clone(),
            sheets: sheets.clone(),
            transport: transport.clone(),
        },
    ));

    TestApp {
        state,
        store,
        oauth,
        sheets,
        transport,
    }
}

/// The `state` query parameter of an authorization URL from [`FakeOAuth`].
#[allow(dead_code)]
pub fn state_from_url(url: &str) -> String {
    url.split("state=")
        .nth(1)
        .expect("authorization URL carries a state")
        .to_string()
}

/// A button press on message 100 in the user's private chat.
#[allow(dead_code)]
pub fn button(user_id: u64, data: &str) -> CallbackQuery {
    CallbackQuery {
        id: format!("cb-{}-{}", user_id, data),
        from: gym_buddy::bot::Sender { id: user_id },
        message: Some(Message {
            message_id: 100,
            from: None,
            chat: gym_buddy::bot::Chat {
                id: user_id as i64,
            },
            text: None,
        }),
        data: Some(data.to_string()),
    }
}

/// A text message from the user in their private chat.
#[allow(dead_code)]
pub fn text_message(user_id: u64, text: &str) -> Message {
    Message {
        message_id: 1,
        from: Some(gym_buddy::bot::Sender { id: user_id }),
        chat: gym_buddy::bot::Chat {
            id: user_id as i64,
        },
        text: Some(text.to_string()),
    }
}
