use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{Semaphore, broadcast};
use tracing::{error, info, warn};

use filadb_common::{DEFAULT_HOST, DEFAULT_PORT, MAX_CONNECTIONS};
use filadb_server::{Connection, handle_connection};
use filadb_storage::Db;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "filadb-server", about = "FilaDB — key/value store com filas bloqueantes")]
struct Args {
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    #[arg(long, default_value_t = MAX_CONNECTIONS)]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filadb_server=info,filadb_storage=info".into()),
        )
        .init();

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let db = Db::new();

    let listener = TcpListener::bind(&addr).await?;
    info!("FilaDB escutando em {addr}");

    let all_permits = u32::try_from(args.max_connections)?;
    let semaphore = Arc::new(Semaphore::new(args.max_connections));
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    loop {
        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => permit?,
            _ = signal::ctrl_c() => break,
        };

        let (socket, peer) = tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok(v) => v,
                    Err(e) => {
                        error!("erro ao aceitar conexão: {e}");
                        continue;
                    }
                }
            }
            _ = signal::ctrl_c() => break,
        };

        info!("nova conexão: {peer}");
        let db = db.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();

        tokio::spawn(async move {
            let conn = Connection::new(socket);
            if let Err(e) = handle_connection(conn, db, &mut shutdown_rx).await {
                error!("erro na conexão {peer}: {e}");
            }
            info!("conexão encerrada: {peer}");
            drop(permit);
        });
    }

    info!("shutdown signal recebido");
    // Primeiro cancela as esperas (clientes recebem CANCELLED), depois fecha as conexões.
    db.shutdown();
    drop(shutdown_tx);

    // Cada conexão devolve seu permit ao terminar.
    match tokio::time::timeout(SHUTDOWN_GRACE, semaphore.acquire_many(all_permits)).await {
        Ok(_) => info!("todas as conexões encerradas"),
        Err(_) => warn!("conexões ainda abertas após {SHUTDOWN_GRACE:?}, encerrando mesmo assim"),
    }

    Ok(())
}
