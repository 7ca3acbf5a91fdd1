use super::{CrawlEvent, WorkerError};
use crate::{
    id::NodeId,
    message::{
        AnnouncePeerRequest, FindNodeRequest, GetPeersRequest, Message, MessageBody, PingRequest,
        Request, Response,
    },
    routing::{
        node::Contact,
        table::{RoutingTable, REPLY_NODE_COUNT},
    },
    token::TokenStore,
};
use std::net::SocketAddr;

/// What to do in reaction to one incoming datagram: the reply goes out first, the
/// event is emitted after it.
#[derive(Debug, Default)]
pub(crate) struct Dispatch {
    pub reply: Option<Message>,
    pub event: Option<CrawlEvent>,
}

/// Reacts to incoming messages. Owns the routing table and the announce tokens.
pub(crate) struct Engine {
    table: RoutingTable,
    tokens: TokenStore,
}

impl Engine {
    pub fn new(table: RoutingTable, tokens: TokenStore) -> Self {
        Self { table, tokens }
    }

    pub fn node_id(&self) -> NodeId {
        self.table.node_id()
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut RoutingTable {
        &mut self.table
    }

    /// Decode the datagram received from `addr` and decide how to react to it.
    ///
    /// Errors mean the datagram is dropped without a reply.
    pub fn handle(&mut self, datagram: &[u8], addr: SocketAddr) -> Result<Dispatch, WorkerError> {
        let message = Message::decode(datagram).map_err(WorkerError::InvalidBencode)?;

        log::trace!("Received from {addr:?} {message:?}");

        match message.body {
            MessageBody::Request(request) => {
                self.handle_request(message.transaction_id, request, addr)
            }
            MessageBody::Response(response) => Ok(self.handle_response(response)),
            MessageBody::Error(error) => {
                log::debug!(
                    "Received error from {addr}: {} {:?}",
                    error.0,
                    error.1
                );
                Ok(Dispatch::default())
            }
        }
    }

    fn handle_response(&mut self, response: Response) -> Dispatch {
        // Responses are accepted whatever query (if any) they answer; only their nodes
        // are of interest.
        let nodes = match response.nodes {
            Some(nodes) => nodes,
            None => return Dispatch::default(),
        };

        let node_id = self.table.node_id();
        let usable: Vec<Contact> = nodes
            .into_iter()
            .filter(|contact| contact.is_valid_for(node_id))
            .collect();

        for contact in &usable {
            self.table.add(*contact);
        }

        Dispatch {
            reply: None,
            event: Some(CrawlEvent::NodesDiscovered(usable)),
        }
    }

    fn handle_request(
        &mut self,
        transaction_id: Vec<u8>,
        request: Request,
        addr: SocketAddr,
    ) -> Result<Dispatch, WorkerError> {
        let dispatch = match request {
            Request::Ping(PingRequest { id }) => Dispatch {
                reply: Some(self.reply(transaction_id, id, None, None)),
                event: None,
            },
            Request::FindNode(FindNodeRequest { id, .. }) => {
                let nodes = self.table.first(REPLY_NODE_COUNT);

                Dispatch {
                    reply: Some(self.reply(transaction_id, id, Some(nodes), None)),
                    event: None,
                }
            }
            Request::GetPeers(GetPeersRequest { id, info_hash }) => {
                let nodes = self.table.first(REPLY_NODE_COUNT);
                let token = self.tokens.current().as_ref().to_vec();

                Dispatch {
                    reply: Some(self.reply(transaction_id, id, Some(nodes), Some(token))),
                    event: Some(CrawlEvent::InfoHashObserved(format!("{info_hash:X}"))),
                }
            }
            Request::AnnouncePeer(request) => self.handle_announce(transaction_id, request, addr)?,
        };

        Ok(dispatch)
    }

    fn handle_announce(
        &mut self,
        transaction_id: Vec<u8>,
        request: AnnouncePeerRequest,
        addr: SocketAddr,
    ) -> Result<Dispatch, WorkerError> {
        if !self.tokens.is_valid(&request.token) {
            return Err(WorkerError::InvalidToken);
        }

        let port = request
            .resolve_port(addr.port())
            .ok_or(WorkerError::InvalidPort)?;

        let mut peer_addr = addr;
        peer_addr.set_port(port);

        Ok(Dispatch {
            reply: Some(self.reply(transaction_id, request.id, None, None)),
            event: Some(CrawlEvent::InfoHashConfirmed {
                info_hash: format!("{:X}", request.info_hash),
                addr: peer_addr,
            }),
        })
    }

    /// Response to a query from `requester`. We present ourselves under an id close to
    /// theirs.
    fn reply(
        &self,
        transaction_id: Vec<u8>,
        requester: NodeId,
        nodes: Option<Vec<Contact>>,
        token: Option<Vec<u8>>,
    ) -> Message {
        Message {
            transaction_id,
            body: MessageBody::Response(Response {
                id: NodeId::neighbor(requester, self.table.node_id()),
                nodes,
                token,
            }),
        }
    }
}
