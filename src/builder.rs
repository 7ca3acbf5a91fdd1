use crate::{
    id::NodeId,
    router,
    routing::{
        node::Contact,
        table::{RoutingTable, DEFAULT_CAPACITY},
    },
    token::DEFAULT_ROTATION_INTERVAL,
    worker::{
        CrawlConfig, CrawlEvent, DhtHandler, OneshotTask, Socket, SocketTrait, State,
        DEFAULT_JOIN_INTERVAL, DEFAULT_WALK_INTERVAL, DEFAULT_WALK_SATURATION,
    },
};
use std::{io, net::SocketAddr, time::Duration};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task,
    time::Instant,
};

/// Crawls the mainline DHT for info-hashes.
///
/// This type is cheaply cloneable where each clone refers to the same underlying crawler. The
/// crawler keeps running until [`Crawler::shutdown`] is called or all clones are dropped, after
/// which the event channel returned from [`CrawlerBuilder::start`] is closed.
#[derive(Clone)]
pub struct Crawler {
    send: mpsc::UnboundedSender<OneshotTask>,
}

impl Crawler {
    /// Create a new CrawlerBuilder.
    pub fn builder() -> CrawlerBuilder {
        CrawlerBuilder {
            routers: router::DEFAULT_ROUTERS
                .iter()
                .map(|router| (*router).to_owned())
                .collect(),
            capacity: DEFAULT_CAPACITY,
            node_id: None,
            join_interval: DEFAULT_JOIN_INTERVAL,
            walk_interval: DEFAULT_WALK_INTERVAL,
            walk_saturation: DEFAULT_WALK_SATURATION,
            token_interval: DEFAULT_ROTATION_INTERVAL,
        }
    }

    /// Start the Crawler with the given CrawlerBuilder.
    fn with_builder(
        builder: CrawlerBuilder,
        socket: Socket,
    ) -> (Self, mpsc::UnboundedReceiver<CrawlEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let table = RoutingTable::new(
            builder.node_id.unwrap_or_else(NodeId::random),
            builder.capacity,
        );
        let config = CrawlConfig {
            routers: builder.routers,
            join_interval: builder.join_interval,
            walk_interval: builder.walk_interval,
            walk_saturation: builder.walk_saturation,
        };
        let handler = DhtHandler::new(
            table,
            builder.token_interval,
            config,
            socket,
            command_rx,
            event_tx,
        );

        task::spawn(handler.run());

        (Self { send: command_tx }, event_rx)
    }

    /// Get the local address this crawler is bound to.
    pub async fn local_addr(&self) -> io::Result<SocketAddr> {
        self.request(OneshotTask::GetLocalAddr).await
    }

    pub async fn state(&self) -> io::Result<State> {
        self.request(OneshotTask::GetState).await
    }

    /// Return the contacts of the routing table, oldest first.
    pub async fn load_contacts(&self) -> io::Result<Vec<Contact>> {
        self.request(OneshotTask::LoadContacts).await
    }

    /// Stop crawling. Pending scheduled queries are cancelled and the socket is closed.
    pub fn shutdown(&self) -> io::Result<()> {
        self.send
            .send(OneshotTask::Shutdown)
            .map_err(|_| shut_down_error())
    }

    async fn request<T, F>(&self, task: F) -> io::Result<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> OneshotTask,
    {
        let (tx, rx) = oneshot::channel();

        self.send.send(task(tx)).map_err(|_| shut_down_error())?;

        rx.await.map_err(|_| shut_down_error())
    }
}

fn shut_down_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "Crawler has shut down")
}

// ----------------------------------------------------------------------------//

#[derive(Debug, Error)]
pub enum Error {
    #[error("routing table capacity must be non-zero")]
    ZeroCapacity,
    #[error("{0} must be non-zero")]
    ZeroSetting(&'static str),
    #[error("{0} is too long")]
    IntervalTooLong(&'static str),
    #[error("only IPv4 sockets are supported (bound to {0})")]
    UnsupportedAddressFamily(SocketAddr),
    #[error("failed to get the socket address")]
    Io(#[from] io::Error),
}

/// Stores information for initializing a crawler.
#[derive(Debug)]
pub struct CrawlerBuilder {
    routers: Vec<String>,
    capacity: usize,
    node_id: Option<NodeId>,
    join_interval: Duration,
    walk_interval: Duration,
    walk_saturation: usize,
    token_interval: Duration,
}

impl CrawlerBuilder {
    /// Replace the bootstrap routers (`host:port`). Defaults to [`router::DEFAULT_ROUTERS`].
    pub fn set_bootstrap<I, T>(mut self, routers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.routers = routers.into_iter().map(|router| router.into()).collect();
        self
    }

    /// Maximum number of contacts in the routing table. Defaults to 600.
    pub fn set_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the id of this node. If not provided, a random node id is generated.
    pub fn set_node_id(mut self, id: NodeId) -> Self {
        self.node_id = Some(id);
        self
    }

    pub fn set_join_interval(mut self, interval: Duration) -> Self {
        self.join_interval = interval;
        self
    }

    pub fn set_walk_interval(mut self, interval: Duration) -> Self {
        self.walk_interval = interval;
        self
    }

    /// Routing table size at which walking pauses until the next join finds the table
    /// below it again.
    pub fn set_walk_saturation(mut self, saturation: usize) -> Self {
        self.walk_saturation = saturation;
        self
    }

    /// How often the `announce_peer` token rotates. Defaults to 5 minutes.
    pub fn set_token_interval(mut self, interval: Duration) -> Self {
        self.token_interval = interval;
        self
    }

    /// Start crawling through the provided socket, which must be bound to an IPv4 address.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S: SocketTrait + Send + Sync + 'static>(
        self,
        socket: S,
    ) -> Result<(Crawler, mpsc::UnboundedReceiver<CrawlEvent>), Error> {
        self.validate()?;

        let socket = Socket::new(socket)?;
        let local_addr = socket.local_addr();
        if !local_addr.is_ipv4() {
            return Err(Error::UnsupportedAddressFamily(local_addr));
        }

        Ok(Crawler::with_builder(self, socket))
    }

    fn validate(&self) -> Result<(), Error> {
        if self.capacity == 0 {
            return Err(Error::ZeroCapacity);
        }

        for (name, is_zero) in [
            ("join interval", self.join_interval.is_zero()),
            ("walk interval", self.walk_interval.is_zero()),
            ("walk saturation", self.walk_saturation == 0),
            ("token interval", self.token_interval.is_zero()),
        ] {
            if is_zero {
                return Err(Error::ZeroSetting(name));
            }
        }

        // Both are added to the current time whenever they are scheduled.
        let now = Instant::now();
        for (name, interval) in [
            ("join interval", self.join_interval),
            ("walk interval", self.walk_interval),
        ] {
            if now.checked_add(interval).is_none() {
                return Err(Error::IntervalTooLong(name));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Crawler, Error};
    use crate::{routing::table::DEFAULT_CAPACITY, test::MockSocket};
    use std::time::Duration;

    #[tokio::test]
    async fn start_rejects_zero_settings() {
        let (socket, _remote) = MockSocket::new();
        assert!(matches!(
            Crawler::builder().set_capacity(0).start(socket),
            Err(Error::ZeroCapacity)
        ));

        let (socket, _remote) = MockSocket::new();
        assert!(matches!(
            Crawler::builder()
                .set_walk_interval(Duration::ZERO)
                .start(socket),
            Err(Error::ZeroSetting("walk interval"))
        ));

        let (socket, _remote) = MockSocket::new();
        assert!(matches!(
            Crawler::builder().set_walk_saturation(0).start(socket),
            Err(Error::ZeroSetting("walk saturation"))
        ));
    }

    #[tokio::test]
    async fn start_rejects_interval_that_cannot_be_scheduled() {
        let (socket, _remote) = MockSocket::new();
        assert!(matches!(
            Crawler::builder()
                .set_join_interval(Duration::MAX)
                .start(socket),
            Err(Error::IntervalTooLong("join interval"))
        ));

        let (socket, _remote) = MockSocket::new();
        assert!(matches!(
            Crawler::builder()
                .set_walk_interval(Duration::MAX)
                .start(socket),
            Err(Error::IntervalTooLong("walk interval"))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn handle_reports_state_until_shutdown() {
        let (socket, _remote) = MockSocket::new();
        let (crawler, mut events) = Crawler::builder()
            .set_bootstrap(["127.0.0.1:6881"])
            .start(socket)
            .unwrap();

        assert_eq!(crawler.local_addr().await.unwrap().port(), 4048);

        let state = crawler.state().await.unwrap();
        assert_eq!(state.capacity, DEFAULT_CAPACITY);
        assert_eq!(state.node_count, 0);
        assert!(crawler.load_contacts().await.unwrap().is_empty());

        crawler.shutdown().unwrap();
        assert!(events.recv().await.is_none());

        assert!(crawler.state().await.is_err());
        assert!(crawler.shutdown().is_err());
    }
}
