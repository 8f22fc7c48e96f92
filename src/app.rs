use crate::config::{Config, CredentialBackend};
use crate::state::{AppState, CredentialStore, FileStore, KeyringStore};
use crate::store::{Action, Outcome, Store};
use crate::transport::Transport;
use crate::types::Reply;
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// One line of output: the action's reply plus the state it left behind.
#[derive(Debug, Serialize)]
struct Emitted {
  reply: Reply<Outcome>,
  revision: u64,
  state: AppState,
}

fn init_logging(filter: &str) {
  let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .try_init();
}

fn credential_store(config: &Config) -> CredentialStore {
  match config.credentials {
    CredentialBackend::Memory => CredentialStore::in_memory(),
    CredentialBackend::Keyring => CredentialStore::new(Arc::new(KeyringStore::new())),
    CredentialBackend::File => {
      let Some(dir) = config.data_dir.as_deref() else {
        tracing::warn!("no data directory available; credentials will not persist");
        return CredentialStore::in_memory();
      };
      match FileStore::open_in_dir(dir) {
        Ok(file) => {
          tracing::debug!(path = %file.path().display(), "credential file opened");
          CredentialStore::new(Arc::new(file))
        }
        Err(e) => {
          tracing::warn!(dir = %dir.display(), error = %e, "credential file unusable; continuing in memory only");
          CredentialStore::in_memory()
        }
      }
    }
  }
}

async fn respond<T: Transport>(store: &Store<T>, line: &str, out: &mut impl Write) -> io::Result<()> {
  let reply = match serde_json::from_str::<Action>(line) {
    Ok(action) => store.invoke(action).await,
    Err(e) => {
      tracing::debug!(error = %e, "unreadable action");
      Reply::err("INVALID_ACTION", e.to_string())
    }
  };
  let state = store.snapshot().await;
  let revision = *store.subscribe().borrow();
  let emitted = Emitted {
    reply,
    revision,
    state,
  };
  let text = serde_json::to_string(&emitted).map_err(io::Error::other)?;
  writeln!(out, "{text}")?;
  out.flush()
}

/// Runs one JSON action per input line until end of input.
async fn serve_lines<T: Transport>(
  store: &Store<T>,
  input: impl BufRead,
  out: &mut impl Write,
) -> io::Result<()> {
  for line in input.lines() {
    let line = line?;
    if line.trim().is_empty() {
      continue;
    }
    respond(store, &line, &mut *out).await?;
  }
  Ok(())
}

pub fn run() -> ExitCode {
  let config = match Config::from_env() {
    Ok(config) => config,
    Err(e) => {
      eprintln!("finboard: {e}");
      return ExitCode::from(2);
    }
  };
  init_logging(&config.log_filter);

  let runtime = match tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
  {
    Ok(rt) => rt,
    Err(e) => {
      tracing::error!(error = %e, "failed to start async runtime");
      return ExitCode::FAILURE;
    }
  };

  let credentials = credential_store(&config);
  let store = match Store::from_config(&config, credentials) {
    Ok(store) => store,
    Err(e) => {
      tracing::error!(error = %e, "failed to build http client");
      return ExitCode::FAILURE;
    }
  };
  tracing::info!(backend = %config.backend_url, "store ready");

  let inline: Vec<String> = std::env::args().skip(1).collect();
  let result = runtime.block_on(async {
    let mut out = io::stdout().lock();
    if inline.is_empty() {
      serve_lines(&store, io::stdin().lock(), &mut out).await
    } else {
      respond(&store, &inline.join(" "), &mut out).await
    }
  });

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      tracing::error!(error = %e, "output failed");
      ExitCode::FAILURE
    }
  }
}
