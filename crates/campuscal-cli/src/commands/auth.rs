use clap::Subcommand;
use campuscal_core::{AuthState, UserIdentity};

use super::{auth_guard, CmdResult};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store a session token issued by the campus identity provider
    Login {
        /// Bearer token
        #[arg(long)]
        token: String,
        /// Token expiry (RFC 3339, e.g. 2025-09-01T00:00:00Z)
        #[arg(long)]
        expires_at: String,
        /// Remote user id the token belongs to
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        email: Option<String>,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove the stored token
    Logout,
    /// Check authentication status
    Status,
}

pub fn run(action: AuthAction) -> CmdResult {
    let guard = auth_guard()?;
    match action {
        AuthAction::Login {
            token,
            expires_at,
            user_id,
            email,
            name,
        } => {
            let user = UserIdentity {
                id: user_id,
                email,
                display_name: name,
            };
            guard.save_auth_data(token, expires_at, user)?;
            if guard.is_authenticated() {
                println!("logged in");
            } else {
                return Err("token stored, but it is already expired or has an unreadable expiry".into());
            }
        }
        AuthAction::Logout => {
            guard.clear_auth_data()?;
            println!("logged out");
        }
        AuthAction::Status => match guard.refresh_state() {
            AuthState::Authenticated(user) => {
                let label = user.display_name.or(user.email).unwrap_or_default();
                if label.is_empty() {
                    println!("authenticated as {}", user.id);
                } else {
                    println!("authenticated as {} ({label})", user.id);
                }
            }
            AuthState::Unauthenticated => println!("not authenticated"),
            AuthState::Error(message) => println!("error: {message}"),
        },
    }
    Ok(())
}
