//! User bootstrap and recovery command handlers

use crate::api::create_app_state_from_config;
use crate::config::Config;
use crate::services::{AccountError, NewAccount, Registration};

fn warn_if_ephemeral_key(config: &Config) {
    if config.verification.secret_key.trim().is_empty() {
        println!("⚠ verification.secret_key is empty: codes issued here cannot be");
        println!("  redeemed by a separately running server.");
    }
}

fn print_account_error(err: &AccountError) {
    match err {
        AccountError::Validation(errors) => {
            println!("✗ Invalid input: {errors}");
        }
        AccountError::UserNotFound => println!("✗ User not found"),
        other => println!("✗ {other}"),
    }
}

pub async fn cmd_create_user(
    config: &Config,
    username: &str,
    mobile: &str,
    password: &str,
    email: Option<&str>,
    superuser: bool,
) -> anyhow::Result<()> {
    let state = create_app_state_from_config(config.clone(), None).await?;

    let account = NewAccount {
        registration: Registration {
            username: Some(username.to_string()),
            mobile: Some(mobile.to_string()),
            email: email.map(str::to_string),
            password: Some(password.to_string()),
            ..Registration::default()
        },
        is_active: true,
        is_staff: superuser,
        is_superuser: superuser,
        ..NewAccount::default()
    };

    match state.account_service.create_account(account).await {
        Ok(created) => {
            let kind = if superuser { "superuser" } else { "user" };
            println!(
                "✓ Created active {} '{}' (id {})",
                kind,
                created.user.display_name(),
                created.user.id
            );
            Ok(())
        }
        Err(e) => {
            print_account_error(&e);
            Err(e.into())
        }
    }
}

pub async fn cmd_issue_code(config: &Config, username: &str) -> anyhow::Result<()> {
    warn_if_ephemeral_key(config);
    let state = create_app_state_from_config(config.clone(), None).await?;

    match state.account_service.reissue_code(username).await {
        Ok(issued) => {
            println!("✓ Verification code issued for '{username}'");
            println!("  Activation key: {}", issued.verification_key);
            Ok(())
        }
        Err(e) => {
            print_account_error(&e);
            Err(e.into())
        }
    }
}
