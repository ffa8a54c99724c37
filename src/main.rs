use keysync::adapters::mock::{InMemoryDirectory, ManualResolver};
use keysync::adapters::{ChannelPasscodeProvider, LoopbackRemote, PromptRequest};
use keysync::config::SessionConfig;
use keysync::error::KeySyncError;
use keysync::keysource::validate_new_passcode;
use keysync::protocol::{ProtocolState, SetupState};
use keysync::reactive::{OneShotMonitor, ReactiveContext};
use keysync::session::{Session, SessionServices};

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Passcode already stored on the loopback remote, if any.
const STORED_PASSCODE_ENV: &str = "KEYSYNC_STORED_PASSCODE";

fn config_path() -> Result<PathBuf> {
    let mut args = std::env::args().skip_while(|arg| arg != "--config");
    if args.next().is_some() {
        return args
            .next()
            .map(PathBuf::from)
            .ok_or_else(|| eyre!("--config needs a path"));
    }
    Ok(SessionConfig::default_path()?)
}

fn init_tracing(config: &SessionConfig) {
    let filter = EnvFilter::try_new(config.effective_log_filter())
        .unwrap_or_else(|_| EnvFilter::new(keysync::config::DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn read_secret(prompt: &'static str) -> Result<String> {
    tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
        .await
        .wrap_err("passcode prompt task failed")?
        .wrap_err("failed to read passcode")
}

/// Show a session failure the way the user should see it.
fn report(err: &KeySyncError) {
    tracing::error!(
        code = err.error_code(),
        category = %err.category(),
        error = %err,
        "session failure"
    );
    eprintln!("{}", err.user_message());
    eprintln!("{}", err.recovery_hint());
}

/// Ask on the terminal until the input passes the local rules.
async fn answer_prompt(request: PromptRequest) -> Result<String> {
    if let Some(message) = request.prior_error().user_message() {
        eprintln!("{}", message);
    }
    if !request.is_new() {
        return read_secret("Passcode: ").await;
    }

    loop {
        let passcode = read_secret("New passcode: ").await?;
        let confirmation = read_secret("Confirm passcode: ").await?;
        match validate_new_passcode(&passcode, &confirmation) {
            Ok(()) => return Ok(passcode),
            Err(err) => eprintln!("{}", err),
        }
    }
}

async fn run(ctx: ReactiveContext, config: SessionConfig) -> Result<()> {
    let protocol = ProtocolState::new(&ctx);
    let remote = LoopbackRemote::new(&protocol, std::env::var(STORED_PASSCODE_ENV).ok());

    let services = SessionServices {
        sink: Rc::new(remote.clone()),
        directory: Arc::new(InMemoryDirectory::new()),
        resolver: Rc::new(ManualResolver::new(&ctx)),
        key_storage: None,
    };
    let session = Session::new(&protocol, config, services).inspect_err(report)?;
    tracing::info!(session_id = %session.id(), "starting loopback session");

    let (prompter, mut prompts) = ChannelPasscodeProvider::new();
    session.set_passcode_provider(Some(Rc::new(prompter)));
    session.start().inspect_err(report)?;

    let (done_tx, mut done_rx) = oneshot::channel::<()>();
    let done_tx = RefCell::new(Some(done_tx));
    let setup = protocol.setup_state().clone();
    let _synced = OneShotMonitor::run(&ctx, "await-sync-success", move || {
        if setup.get() != SetupState::Success {
            return false;
        }
        if let Some(tx) = done_tx.borrow_mut().take() {
            let _ = tx.send(());
        }
        true
    });

    remote.connect();

    loop {
        tokio::select! {
            _ = &mut done_rx => break,
            request = prompts.recv() => {
                let Some(request) = request else { break };
                let passcode = answer_prompt(request).await?;
                match session.passcode_key_source().set_passcode(passcode) {
                    Ok(()) => {}
                    // Still pending; it is resent once the remote is back.
                    Err(err) if err.is_retryable() => {
                        tracing::warn!(code = err.error_code(), error = %err, "passcode not delivered yet");
                        eprintln!("{}", err.user_message());
                    }
                    Err(err) => {
                        report(&err);
                        return Err(err.into());
                    }
                }
            }
        }
    }

    for failure in ctx.take_failures() {
        tracing::warn!(monitor = %failure.monitor, error = %failure.error, "monitor failed during session");
    }
    session.stop();
    println!("Keys synchronized.");
    Ok(())
}

fn main() -> Result<()> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("keysync {}", VERSION);
        std::process::exit(0);
    }

    color_eyre::install()?;

    let path = config_path()?;
    let config = SessionConfig::load(&path)
        .wrap_err_with(|| format!("failed to load {}", path.display()))?;
    init_tracing(&config);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let ctx = ReactiveContext::new();
    runtime.block_on(ctx.run_until(run(ctx.clone(), config)))
}
