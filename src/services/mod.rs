pub mod code_cache;
pub use code_cache::{CodeCache, DatabaseCodeCache, MemoryCodeCache};

pub mod notifier;
pub use notifier::{LogNotifier, Notifier, NotifyError, WebhookNotifier};

pub mod verification;
pub use verification::{CodeCipher, IssuedCode, VerificationError, VerificationService};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, LoginResult, PasswordChange};
pub use auth_service_impl::SeaOrmAuthService;

pub mod account_service;
pub mod account_service_impl;
pub use account_service::{
    AccountError, AccountService, AccountUpdate, CreatedAccount, NewAccount, Registration,
};
pub use account_service_impl::SeaOrmAccountService;
