use super::{
    resolve,
    socket::Socket,
    timer::{Timeout, Timer},
    ScheduledTask,
};
use crate::{
    id::{Id, NodeId},
    message::{FindNodeRequest, Message, MessageBody, Request},
    routing::table::RoutingTable,
};
use std::{
    net::{SocketAddr, SocketAddrV4},
    time::Duration,
};

/// Default delay between two joins.
pub const DEFAULT_JOIN_INTERVAL: Duration = Duration::from_millis(3000);
/// Default delay between two walk steps.
pub const DEFAULT_WALK_INTERVAL: Duration = Duration::from_millis(200);
/// Default table size at which the walk pauses.
pub const DEFAULT_WALK_SATURATION: usize = 1000;

#[derive(Clone, Debug)]
pub(crate) struct CrawlConfig {
    /// Bootstrap routers as `host:port`.
    pub routers: Vec<String>,
    pub join_interval: Duration,
    pub walk_interval: Duration,
    pub walk_saturation: usize,
}

/// Drives the exploration of the network with two self-rescheduling tasks:
///
/// * join: ask every bootstrap router for nodes close to a random target,
/// * walk: take the oldest contact out of the routing table and ask it for nodes close
///   to itself.
///
/// Both only send queries. Whatever comes back goes through the regular incoming path.
pub(crate) struct CrawlScheduler {
    config: CrawlConfig,
    routers: Vec<SocketAddrV4>,
    join_timeout: Option<Timeout>,
    walk_timeout: Option<Timeout>,
}

impl CrawlScheduler {
    pub fn new(config: CrawlConfig) -> Self {
        Self {
            config,
            routers: Vec::new(),
            join_timeout: None,
            walk_timeout: None,
        }
    }

    pub fn is_walking(&self) -> bool {
        self.walk_timeout.is_some()
    }

    /// Schedule the first join and the first walk step to run right away.
    pub fn start(&mut self, timer: &mut Timer<ScheduledTask>) {
        self.join_timeout = Some(timer.schedule_in(Duration::ZERO, ScheduledTask::Join));
        self.walk_timeout = Some(timer.schedule_in(Duration::ZERO, ScheduledTask::Walk));
    }

    pub fn stop(&mut self, timer: &mut Timer<ScheduledTask>) {
        if let Some(timeout) = self.join_timeout.take() {
            timer.cancel(timeout);
        }

        if let Some(timeout) = self.walk_timeout.take() {
            timer.cancel(timeout);
        }
    }

    pub async fn join(
        &mut self,
        table: &RoutingTable,
        socket: &Socket,
        timer: &mut Timer<ScheduledTask>,
    ) {
        self.join_timeout = None;

        if self.routers.is_empty() {
            self.routers = resolve(&self.config.routers).await;

            if self.routers.is_empty() {
                log::warn!("None of the bootstrap routers could be resolved");
            }
        }

        log::debug!("Joining through {} routers", self.routers.len());

        for router in &self.routers {
            let query = find_node(table.node_id(), Id::random());
            send(socket, &query, SocketAddr::V4(*router)).await;
        }

        self.join_timeout =
            Some(timer.schedule_in(self.config.join_interval, ScheduledTask::Join));

        if !self.is_walking() && table.len() < self.config.walk_saturation {
            log::debug!("Resuming walk, routing table has {} nodes", table.len());
            self.walk_timeout = Some(timer.schedule_in(Duration::ZERO, ScheduledTask::Walk));
        }
    }

    pub async fn walk(
        &mut self,
        table: &mut RoutingTable,
        socket: &Socket,
        timer: &mut Timer<ScheduledTask>,
    ) {
        self.walk_timeout = None;

        // Checked against the current size, not the one at the time this step was
        // scheduled.
        if table.len() >= self.config.walk_saturation {
            log::debug!("Pausing walk, routing table has {} nodes", table.len());
            return;
        }

        if let Some(contact) = table.shift() {
            let id = NodeId::neighbor(contact.id, table.node_id());
            send(socket, &find_node(id, id), contact.socket_addr()).await;
        }

        self.walk_timeout =
            Some(timer.schedule_in(self.config.walk_interval, ScheduledTask::Walk));
    }
}

fn find_node(id: NodeId, target: NodeId) -> Message {
    Message {
        transaction_id: rand::random::<[u8; 2]>().to_vec(),
        body: MessageBody::Request(Request::FindNode(FindNodeRequest { id, target })),
    }
}

async fn send(socket: &Socket, message: &Message, addr: SocketAddr) {
    if let Err(error) = socket.send(message, addr).await {
        log::warn!("Failed to send query to {addr}: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::{CrawlConfig, CrawlScheduler};
    use crate::{
        id::{NodeId, ID_LEN},
        message::{FindNodeRequest, Message, MessageBody, Request},
        routing::table::RoutingTable,
        test::{self, MockRemote, MockSocket},
        worker::{socket::Socket, timer::Timer, ScheduledTask},
    };
    use futures_util::StreamExt;
    use std::{
        net::{Ipv4Addr, SocketAddr, SocketAddrV4},
        time::Duration,
    };
    use tokio::time::Instant;

    const SELF_ID: [u8; ID_LEN] = [1; ID_LEN];

    fn config(walk_saturation: usize) -> CrawlConfig {
        CrawlConfig {
            routers: vec!["127.0.0.1:6881".to_owned(), "127.0.0.2:6881".to_owned()],
            join_interval: Duration::from_millis(3000),
            walk_interval: Duration::from_millis(200),
            walk_saturation,
        }
    }

    fn setup(walk_saturation: usize) -> (CrawlScheduler, RoutingTable, Socket, MockRemote) {
        let (socket, remote) = MockSocket::new();

        (
            CrawlScheduler::new(config(walk_saturation)),
            RoutingTable::new(NodeId::from(SELF_ID), 16),
            Socket::new(socket).unwrap(),
            remote,
        )
    }

    fn sent_find_nodes(remote: &MockRemote) -> Vec<(FindNodeRequest, SocketAddr)> {
        remote
            .drain_sent()
            .into_iter()
            .map(|(bytes, addr)| match Message::decode(&bytes).unwrap().body {
                MessageBody::Request(Request::FindNode(request)) => (request, addr),
                body => panic!("unexpected message {:?}", body),
            })
            .collect()
    }

    fn router(last_octet: u8) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, last_octet), 6881))
    }

    #[tokio::test(start_paused = true)]
    async fn join_queries_every_router_and_reschedules() {
        let (mut crawl, mut table, socket, remote) = setup(1000);
        let mut timer = Timer::new();
        let start = Instant::now();

        crawl.start(&mut timer);
        assert_eq!(timer.next().await, Some(ScheduledTask::Join));
        crawl.join(&table, &socket, &mut timer).await;

        let sent = sent_find_nodes(&remote);
        assert_eq!(
            sent.iter().map(|(_, addr)| *addr).collect::<Vec<_>>(),
            vec![router(1), router(2)]
        );
        for (request, _) in &sent {
            assert_eq!(request.id, NodeId::from(SELF_ID));
        }
        assert_ne!(sent[0].0.target, sent[1].0.target);

        // The first walk step was scheduled together with the join.
        assert_eq!(timer.next().await, Some(ScheduledTask::Walk));
        crawl.walk(&mut table, &socket, &mut timer).await;

        let mut tasks = Vec::new();
        while let Some(task) = timer.next().await {
            tasks.push((task, start.elapsed()));
            if task == ScheduledTask::Join {
                break;
            }
        }

        assert_eq!(tasks.last(), Some(&(ScheduledTask::Join, Duration::from_millis(3000))));
    }

    #[tokio::test(start_paused = true)]
    async fn walk_queries_oldest_contact_with_neighbor_id() {
        let (mut crawl, mut table, socket, remote) = setup(1000);
        let mut timer = Timer::new();
        let contacts = test::dummy_contacts(2);
        for contact in &contacts {
            table.add(*contact);
        }

        crawl.walk(&mut table, &socket, &mut timer).await;

        let sent = sent_find_nodes(&remote);
        let expected = NodeId::neighbor(contacts[0].id, NodeId::from(SELF_ID));
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, contacts[0].socket_addr());
        assert_eq!(sent[0].0.id, expected);
        assert_eq!(sent[0].0.target, expected);

        // The contact was consumed.
        assert_eq!(table.nodes().copied().collect::<Vec<_>>(), contacts[1..]);
        assert!(crawl.is_walking());
    }

    #[tokio::test(start_paused = true)]
    async fn walk_on_empty_table_keeps_going() {
        let (mut crawl, mut table, socket, remote) = setup(1000);
        let mut timer = Timer::new();
        let start = Instant::now();

        crawl.walk(&mut table, &socket, &mut timer).await;

        assert!(remote.drain_sent().is_empty());
        assert!(crawl.is_walking());
        assert_eq!(timer.next().await, Some(ScheduledTask::Walk));
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn walk_pauses_at_saturation_and_resumes_on_join() {
        let (mut crawl, mut table, socket, remote) = setup(2);
        let mut timer = Timer::new();
        for contact in test::dummy_contacts(2) {
            table.add(contact);
        }

        crawl.walk(&mut table, &socket, &mut timer).await;

        assert!(remote.drain_sent().is_empty());
        assert!(!crawl.is_walking());
        assert!(timer.is_empty());
        assert_eq!(table.len(), 2);

        // Still saturated: the join does not resume the walk.
        crawl.join(&table, &socket, &mut timer).await;
        assert!(!crawl.is_walking());

        table.shift();
        crawl.join(&table, &socket, &mut timer).await;
        assert!(crawl.is_walking());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_both_timers() {
        let (mut crawl, _table, _socket, _remote) = setup(1000);
        let mut timer = Timer::new();

        crawl.start(&mut timer);
        crawl.stop(&mut timer);

        assert!(!crawl.is_walking());
        assert!(timer.is_empty());
        assert_eq!(timer.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn routers_are_resolved_once() {
        let (mut crawl, table, socket, remote) = setup(1000);
        let mut timer = Timer::new();

        crawl.join(&table, &socket, &mut timer).await;
        crawl.config.routers.clear();
        crawl.join(&table, &socket, &mut timer).await;

        assert_eq!(sent_find_nodes(&remote).len(), 4);
    }
}
