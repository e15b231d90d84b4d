//! User-facing texts.

/// Prompt for the phone number that starts a login cycle.
pub const START_PROMPT: &str =
    "Assalomu alaykum! Telefon raqamingizni yuboring (masalan: +998901234567):";

/// Prompt for the password once the phone number is cached.
pub const PASSWORD_PROMPT: &str = "Parolni yuboring:";

/// Sent after a successful login.
pub const LOGIN_SUCCESS: &str = "✅ Muvaffaqiyatli! Endi savolingizni yuboring.";

/// Sent when a question arrives without a usable token.
pub const LOGIN_REQUIRED: &str = "Avval /start orqali login qiling.";

/// Used when the backend rejects a question without saying why.
pub const REJECTION_FALLBACK: &str = "Uzr, savolingizni tushunmadim. Qayta yuboring.";

/// Generic apology for transport failures while submitting.
pub const SUBMIT_FAILED: &str = "Uzr, xatolik yuz berdi. Birozdan so'ng qayta urinib ko'ring.";

/// Generic apology for transport failures while logging in.
pub const LOGIN_UNAVAILABLE: &str =
    "Uzr, server bilan bog'lanib bo'lmadi.\nQayta urinib ko'ring: /start";

/// A canned reply chosen by the dispatcher without talking to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Ask for the phone number.
    StartPrompt,
    /// Ask for the password.
    PasswordPrompt,
    /// Tell the user to log in again.
    LoginRequired,
}

impl Reply {
    /// Text sent to the chat.
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::StartPrompt => START_PROMPT,
            Self::PasswordPrompt => PASSWORD_PROMPT,
            Self::LoginRequired => LOGIN_REQUIRED,
        }
    }
}

/// Failed login, with the reason and a restart hint.
pub fn login_failed(reason: &str) -> String {
    format!("Login xato: {reason}\nQayta urinib ko'ring: /start")
}

/// Relay of a backend rejection.
pub fn rejection(message: &str) -> String {
    let message = message.trim();
    let message = if message.is_empty() {
        REJECTION_FALLBACK
    } else {
        message
    };
    format!("{message}\n\n*Yangi savolingizni yuboring.*")
}
