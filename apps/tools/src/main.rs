use std::fs;

use admission::lock_join_to_members;
use anyhow::{Context, Result};
use call_backend::{CallTypeAdmin, InMemoryCallBackend, JwtCredentialIssuer};
use clap::{Parser, Subcommand, ValueEnum};
use shared::identity::{direct_room_key, Identity, RoomKey};

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Direct,
    Group,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the normalized form of an identity.
    Normalize { raw: String },
    /// Print the room key a join request resolves to.
    RoomKey {
        #[arg(long, value_enum, default_value = "direct")]
        mode: Mode,
        /// Requester for direct rooms, room id for group rooms.
        first: String,
        second: Option<String>,
    },
    /// Sign a join credential for an identity.
    IssueCredential {
        identity: String,
        #[arg(long, env = "STREAM_API_KEY", default_value = "devkey")]
        api_key: String,
        #[arg(long, env = "STREAM_API_SECRET", default_value = "devsecret")]
        api_secret: String,
        #[arg(long, default_value_t = 3600)]
        ttl: i64,
    },
    /// Check a credential's signature and expiry and print its claims.
    VerifyCredential {
        /// The token itself, or `@path` to read it from a file.
        token: String,
        #[arg(long, env = "STREAM_API_KEY", default_value = "devkey")]
        api_key: String,
        #[arg(long, env = "STREAM_API_SECRET", default_value = "devsecret")]
        api_secret: String,
    },
    /// Show the grants a call type ends up with once joining is locked to members.
    LockGrants {
        #[arg(long, default_value = "default")]
        call_type: String,
    },
}

fn room_key(mode: Mode, first: &str, second: Option<&str>) -> Result<RoomKey> {
    match (mode, second) {
        (Mode::Direct, Some(peer)) => Ok(direct_room_key(first, peer)),
        (Mode::Direct, None) => anyhow::bail!("direct rooms need two identities"),
        (Mode::Group, None) => Ok(RoomKey::group(first)),
        (Mode::Group, Some(_)) => anyhow::bail!("group rooms take a single room id"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Normalize { raw } => {
            println!("{}", Identity::normalize(&raw));
        }
        Command::RoomKey {
            mode,
            first,
            second,
        } => {
            println!("{}", room_key(mode, &first, second.as_deref())?);
        }
        Command::IssueCredential {
            identity,
            api_key,
            api_secret,
            ttl,
        } => {
            let issuer = JwtCredentialIssuer::new(api_key, api_secret);
            let token = issuer.mint(&Identity::normalize(&identity), ttl)?;
            println!("{}", token.as_str());
        }
        Command::VerifyCredential {
            token,
            api_key,
            api_secret,
        } => {
            let token = match token.strip_prefix('@') {
                Some(path) => fs::read_to_string(path)
                    .with_context(|| format!("failed to read token from {path}"))?,
                None => token,
            };
            let claims = JwtCredentialIssuer::new(api_key, api_secret)
                .verify(token.trim())
                .context("credential rejected")?;
            println!("iss={} sub={} user_id={}", claims.iss, claims.sub, claims.user_id);
            println!("iat={} exp={}", claims.iat, claims.exp);
        }
        Command::LockGrants { call_type } => {
            let backend = InMemoryCallBackend::new()
                .with_open_call_type(&call_type)
                .await;
            let outcome = lock_join_to_members(&backend, &call_type).await?;
            let grants = backend
                .call_type_grants(&call_type)
                .await?
                .unwrap_or_default();
            println!("{outcome:?}");
            for (role, capabilities) in grants {
                println!("{role}: {}", capabilities.join(", "));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_key_checks_arity_per_mode() {
        assert_eq!(
            room_key(Mode::Direct, "U2", Some("u1")).expect("direct").to_string(),
            "direct:u1~u2"
        );
        assert_eq!(
            room_key(Mode::Group, "Team A", None).expect("group").to_string(),
            "group:team_a"
        );
        assert!(room_key(Mode::Direct, "u1", None).is_err());
        assert!(room_key(Mode::Group, "a", Some("b")).is_err());
    }

    #[test]
    fn cli_parses_group_room_key() {
        let cli = Cli::try_parse_from(["tools", "room-key", "--mode", "group", "teamA"])
            .expect("parse");
        assert!(matches!(
            cli.command,
            Command::RoomKey {
                mode: Mode::Group,
                second: None,
                ..
            }
        ));
    }
}
