//! streamctl - authorize against Twitch and run polls from the terminal.

use anyhow::{bail, Context};
use std::future::Future;
use clap::{Parser, Subcommand};
use streamctl::auth::DEFAULT_CALLBACK_PORT;
use streamctl::prelude::*;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "streamctl", version, about = "Twitch moderation and engagement from the command line")]
struct Cli {
    /// Local port the authorization redirect is received on.
    #[arg(long, env = "STREAMCTL_CALLBACK_PORT", default_value_t = DEFAULT_CALLBACK_PORT, global = true)]
    callback_port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store the application's client id (and optionally its secret), then authenticate.
    Setup {
        /// Client id of the registered application.
        #[arg(long)]
        client_id: String,

        /// Prompt for the client secret to use the authorization code flow.
        #[arg(long)]
        secret: bool,

        /// Only store the credentials.
        #[arg(long)]
        no_auth: bool,
    },

    /// Authorize in the browser and store the resulting tokens.
    Authenticate,

    /// Create a poll and wait for its result.
    Poll {
        /// Channel (login name) to run the poll on.
        #[arg(short = 'c', long = "channel-name")]
        channel_name: String,

        /// Poll question.
        #[arg(short, long)]
        title: String,

        /// Duration in seconds.
        #[arg(short, long, default_value_t = 60)]
        duration: u64,

        /// Print the poll id and return without waiting for the result.
        #[arg(long)]
        no_watch: bool,

        /// Announce the poll in chat when it starts.
        #[arg(long)]
        send_announcement: bool,

        /// Announce the result in chat when it ends.
        #[arg(long)]
        send_announcement_result: bool,

        /// Between 2 and 5 options.
        #[arg(required = true)]
        options: Vec<String>,
    },

    /// Print the user id of a login, or of the authorized user.
    UserId {
        /// Login name to look up.
        login: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let app = App::with_keyring(AuthConfig::twitch().with_callback_port(cli.callback_port));

    match cli.command {
        Command::Setup {
            client_id,
            secret,
            no_auth,
        } => {
            let client_secret = if secret {
                let value = rpassword::prompt_password("Client secret: ")
                    .context("failed to read the client secret")?;
                let value = value.trim().to_string();
                if value.is_empty() {
                    bail!("the client secret cannot be empty");
                }
                Some(value)
            } else {
                None
            };
            app.setup(&client_id, client_secret.as_deref())?;
            println!("Client credentials stored.");

            if !no_auth {
                authenticate(&app).await?;
            }
        }
        Command::Authenticate => authenticate(&app).await?,
        Command::Poll {
            channel_name,
            title,
            duration,
            no_watch,
            send_announcement,
            send_announcement_result,
            options,
        } => {
            if !(2..=5).contains(&options.len()) {
                bail!(
                    "a poll needs between 2 and 5 options, {} provided",
                    options.len()
                );
            }
            let request = PollRequest {
                channel: channel_name,
                title,
                duration,
                options,
                announce_start: send_announcement,
                announce_result: send_announcement_result,
                watch: !no_watch,
            };
            let watch = request.watch;

            let outcome = app
                .run_poll(
                    &request,
                    |poll| {
                        println!("Poll created with ID: {}", poll.id);
                        if watch {
                            println!("Waiting for poll completion...");
                            println!("Press CTRL+C once to close the poll and tally results early.\n");
                        }
                    },
                    interrupted(),
                )
                .await?;

            if let PollOutcome::Finished { tally, .. } = outcome {
                println!("Poll completed! Here are the results for \"{}\":", tally.title);
                for choice in &tally.choices {
                    println!("Option: {}, Votes: {}", choice.title, choice.votes);
                }
                println!("\n{}", tally);
            }
        }
        Command::UserId { login } => {
            let id = app.user_id(login.as_deref()).await?;
            println!("{}", id);
        }
    }

    Ok(())
}

async fn authenticate(app: &App) -> anyhow::Result<()> {
    let outcome = app
        .authenticate(|url| {
            println!("Open this URL in your browser to authorize streamctl:\n\n{}\n", url);
            if let Err(e) = open::that(url) {
                debug!(error = %e, "Could not open a browser");
            }
        })
        .await?;

    match outcome.flow {
        FlowKind::AuthorizationCode => println!("Authorized. Access and refresh tokens stored."),
        FlowKind::ImplicitToken => println!("Authorized. Access token stored."),
    }
    Ok(())
}

/// Resolves on the first Ctrl+C. A second one exits without waiting.
async fn interrupted() {
    first_signal(tokio::signal::ctrl_c, || {
        eprintln!("\nInterrupted again, exiting without waiting for the poll.");
        std::process::exit(130);
    })
    .await
}

/// Resolves when `signal` first fires, then arms it again to run `on_repeat`.
///
/// Listening for Ctrl+C replaces the default handler for the rest of the
/// process, so without the second listener later presses would be ignored.
async fn first_signal<S, Fut, F>(mut signal: S, on_repeat: F)
where
    S: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = std::io::Result<()>> + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    if let Err(e) = signal().await {
        warn!(error = %e, "Could not listen for Ctrl+C; the poll can only end on its own");
        std::future::pending::<()>().await;
    }

    println!("Ending the poll early. Press CTRL+C again to exit without waiting for the results.");
    tokio::spawn(async move {
        if signal().await.is_ok() {
            on_repeat();
        }
    });
}
