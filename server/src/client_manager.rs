//! Connection table for the server.
//!
//! Tracks which socket address belongs to which client id, enforces the
//! connection limit and notices clients that went silent. Everything about
//! the match itself lives in [`crate::game`]; this module only knows sockets.

use log::info;
use shared::SequencedMove;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected socket.
#[derive(Debug)]
pub struct Client {
    pub id: u32,
    pub addr: SocketAddr,
    /// Last time any packet arrived from this client
    pub last_seen: Instant,
    pub packets_received: u64,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            packets_received: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
        self.packets_received += 1;
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Registers a new connection. Returns `None` when the server is full.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!(
                "Client {} disconnected after {} packets",
                client.id, client.packets_received
            );
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Marks the client at `addr` as alive and returns its id.
    pub fn touch(&mut self, addr: SocketAddr) -> Option<u32> {
        let client = self.clients.values_mut().find(|c| c.addr == addr)?;
        client.touch();
        Some(client.id)
    }

    pub fn addr_of(&self, client_id: u32) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// Removes clients silent for longer than the timeout and returns their ids.
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timeout = self.timeout;
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            info!("Client {} timed out", client_id);
            self.remove_client(client_id);
        }

        timed_out
    }
}

/// Keeps at most `max` moves of one input packet, dropping the oldest.
pub fn limit_moves(mut moves: Vec<SequencedMove>, max: usize) -> Vec<SequencedMove> {
    if moves.len() > max {
        moves.sort_by_key(|m| m.sequence);
        let excess = moves.len() - max;
        moves.drain(..excess);
    }
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Move;
    use std::net::{IpAddr, Ipv4Addr};
    use std::thread;

    fn create_test_addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    fn manager(max_clients: usize) -> ClientManager {
        ClientManager::new(max_clients, Duration::from_secs(5))
    }

    #[test]
    fn test_client_creation() {
        let addr = create_test_addr(8080);
        let client = Client::new(42, addr);

        assert_eq!(client.id, 42);
        assert_eq!(client.addr, addr);
        assert_eq!(client.packets_received, 0);
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_client_assigns_increasing_ids() {
        let mut manager = manager(4);
        assert_eq!(manager.add_client(create_test_addr(8080)), Some(1));
        assert_eq!(manager.add_client(create_test_addr(8081)), Some(2));
        assert_eq!(manager.clients.len(), 2);
    }

    #[test]
    fn test_max_clients_limit() {
        let mut manager = manager(2);
        assert!(manager.add_client(create_test_addr(8080)).is_some());
        assert!(manager.add_client(create_test_addr(8081)).is_some());
        assert_eq!(manager.add_client(create_test_addr(8082)), None);

        manager.remove_client(&1);
        assert_eq!(manager.add_client(create_test_addr(8082)), Some(3));
    }

    #[test]
    fn test_remove_client() {
        let mut manager = manager(4);
        let id = manager.add_client(create_test_addr(8080)).unwrap();

        assert!(manager.remove_client(&id));
        assert!(!manager.remove_client(&id));
        assert!(manager.clients.is_empty());
    }

    #[test]
    fn test_lookup_by_addr_and_id() {
        let mut manager = manager(4);
        let addr = create_test_addr(9000);
        let id = manager.add_client(addr).unwrap();

        assert_eq!(manager.find_client_by_addr(addr), Some(id));
        assert_eq!(manager.find_client_by_addr(create_test_addr(9001)), None);
        assert_eq!(manager.addr_of(id), Some(addr));
        assert_eq!(manager.addr_of(id + 1), None);
    }

    #[test]
    fn test_touch_counts_packets() {
        let mut manager = manager(4);
        let addr = create_test_addr(9000);
        let id = manager.add_client(addr).unwrap();

        assert_eq!(manager.touch(addr), Some(id));
        assert_eq!(manager.touch(addr), Some(id));
        assert_eq!(manager.touch(create_test_addr(1)), None);
        assert_eq!(manager.clients[&id].packets_received, 2);
    }

    #[test]
    fn test_client_timeout() {
        let mut manager = ClientManager::new(4, Duration::from_millis(20));
        let quiet = manager.add_client(create_test_addr(8080)).unwrap();
        let chatty_addr = create_test_addr(8081);
        let chatty = manager.add_client(chatty_addr).unwrap();

        thread::sleep(Duration::from_millis(30));
        manager.touch(chatty_addr);

        assert_eq!(manager.check_timeouts(), vec![quiet]);
        assert_eq!(manager.find_client_by_addr(chatty_addr), Some(chatty));
        assert_eq!(manager.clients.len(), 1);
    }

    #[test]
    fn test_limit_moves_keeps_newest() {
        let moves: Vec<SequencedMove> = (1..=100)
            .rev()
            .map(|sequence| SequencedMove {
                sequence,
                mv: Move::default(),
            })
            .collect();
        let kept = limit_moves(moves, 64);
        assert_eq!(kept.len(), 64);
        assert_eq!(kept[0].sequence, 37);
        assert_eq!(kept[63].sequence, 100);

        let few = vec![SequencedMove {
            sequence: 5,
            mv: Move::default(),
        }];
        assert_eq!(limit_moves(few.clone(), 64), few);
    }
}
