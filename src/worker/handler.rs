use super::{
    crawl::{CrawlConfig, CrawlScheduler},
    engine::Engine,
    socket::Socket,
    timer::Timer,
    CrawlEvent, OneshotTask, ScheduledTask, State, WorkerError,
};
use crate::{routing::table::RoutingTable, token::TokenStore};
use futures_util::StreamExt;
use std::{net::SocketAddr, time::Duration};
use tokio::sync::mpsc;

/// The crawler itself. Owns the socket and all the state, and reacts to incoming
/// datagrams, timeouts and commands from the `Crawler` handles, one at a time.
pub(crate) struct DhtHandler {
    running: bool,
    command_rx: mpsc::UnboundedReceiver<OneshotTask>,
    socket: Socket,
    timer: Timer<ScheduledTask>,
    engine: Engine,
    crawl: CrawlScheduler,
    event_tx: mpsc::UnboundedSender<CrawlEvent>,
}

impl DhtHandler {
    pub fn new(
        table: RoutingTable,
        token_interval: Duration,
        config: CrawlConfig,
        socket: Socket,
        command_rx: mpsc::UnboundedReceiver<OneshotTask>,
        event_tx: mpsc::UnboundedSender<CrawlEvent>,
    ) -> Self {
        Self {
            running: false,
            command_rx,
            socket,
            timer: Timer::new(),
            engine: Engine::new(table, TokenStore::new(token_interval)),
            crawl: CrawlScheduler::new(config),
            event_tx,
        }
    }

    pub async fn run(mut self) {
        log::info!(
            "Crawling on {} as {:?}",
            self.socket.local_addr(),
            self.engine.node_id()
        );

        self.crawl.start(&mut self.timer);
        self.running = true;

        while self.running {
            self.run_once().await
        }

        self.crawl.stop(&mut self.timer);

        log::info!("Crawler shut down");
    }

    async fn run_once(&mut self) {
        tokio::select! {
            task = self.timer.next(), if !self.timer.is_empty() => {
                if let Some(task) = task {
                    self.handle_timeout(task).await
                }
            }
            command = self.command_rx.recv() => {
                if let Some(command) = command {
                    self.handle_command(command)
                } else {
                    // All `Crawler` handles are gone.
                    self.shutdown()
                }
            }
            message = self.socket.recv() => {
                match message {
                    Ok((buffer, addr)) => {
                        if let Err(error) = self.handle_incoming(&buffer, addr).await {
                            log::debug!("Dropped message from {addr}: {error}");
                        }
                    }
                    Err(error) => log::warn!("Failed to receive: {error}"),
                }
            }
        }
    }

    fn handle_command(&mut self, task: OneshotTask) {
        match task {
            OneshotTask::GetLocalAddr(tx) => {
                tx.send(self.socket.local_addr()).unwrap_or(());
            }
            OneshotTask::GetState(tx) => {
                tx.send(self.state()).unwrap_or(());
            }
            OneshotTask::LoadContacts(tx) => {
                let contacts = self.engine.table().nodes().copied().collect();
                tx.send(contacts).unwrap_or(());
            }
            OneshotTask::Shutdown => self.shutdown(),
        }
    }

    async fn handle_timeout(&mut self, task: ScheduledTask) {
        match task {
            ScheduledTask::Join => {
                self.crawl
                    .join(self.engine.table(), &self.socket, &mut self.timer)
                    .await
            }
            ScheduledTask::Walk => {
                self.crawl
                    .walk(self.engine.table_mut(), &self.socket, &mut self.timer)
                    .await
            }
        }
    }

    async fn handle_incoming(&mut self, buffer: &[u8], addr: SocketAddr) -> Result<(), WorkerError> {
        let dispatch = self.engine.handle(buffer, addr)?;

        if let Some(reply) = dispatch.reply {
            // The event goes out whether or not the reply made it.
            if let Err(error) = self.socket.send(&reply, addr).await {
                log::warn!("Failed to reply to {addr}: {}", WorkerError::from(error));
            }
        }

        if let Some(event) = dispatch.event {
            // Nobody listening is not a reason to stop crawling.
            self.event_tx.send(event).unwrap_or(());
        }

        Ok(())
    }

    fn state(&self) -> State {
        State {
            node_count: self.engine.table().len(),
            capacity: self.engine.table().capacity(),
            walking: self.crawl.is_walking(),
        }
    }

    fn shutdown(&mut self) {
        self.running = false;
    }
}
