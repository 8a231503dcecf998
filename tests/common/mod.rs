//! Common test utilities - ArenaTest harness for end-to-end testing

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use arenad::{Config, Server};
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Test harness that spawns a real arenad server on a random port
pub struct ArenaTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl ArenaTest {
    /// Start a new test server instance
    pub async fn start() -> Result<Self> {
        Self::start_with_timeout(30).await
    }

    /// Start a test server with a custom turn timeout
    pub async fn start_with_timeout(turn_timeout_secs: u64) -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let config = Config {
            bind_addr: addr,
            grid_width: 20,
            grid_height: 20,
            turn_timeout_secs,
            rng_seed: None,
            spawn_golem: false,
        };

        let server = Arc::new(Server::new(config));
        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        // Wait for server to be ready
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            _handle: handle,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }

    /// Create a game and return its id
    pub async fn create_game(&self, name: &str) -> Result<String> {
        let resp = self
            .post("/games", &serde_json::json!({ "name": name }))
            .await?;
        assert_eq!(resp.status(), 201);
        let body: serde_json::Value = resp.json().await?;
        Ok(body["game_id"].as_str().unwrap().to_string())
    }

    /// Add a sword-armed fighter at a position and return its character id
    pub async fn add_fighter(
        &self,
        game_id: &str,
        name: &str,
        owner_id: &str,
        x: u32,
        y: u32,
    ) -> Result<String> {
        let body = serde_json::json!({
            "name": name,
            "owner_id": owner_id,
            "max_hp": 20,
            "armor_class": 15,
            "ability_scores": { "dexterity": 14 },
            "attacks": [{
                "name": "Longsword",
                "attack_bonus": 5,
                "damage_dice": "1d8",
                "damage_bonus": 3,
                "damage_type": "slashing",
                "reach": 5
            }],
            "position": { "x": x, "y": y }
        });
        let resp = self
            .post(&format!("/games/{}/characters", game_id), &body)
            .await?;
        assert_eq!(resp.status(), 201);
        let body: serde_json::Value = resp.json().await?;
        Ok(body["character_id"].as_str().unwrap().to_string())
    }

    /// Start combat and return the initiative order
    pub async fn start_game(&self, game_id: &str) -> Result<Vec<String>> {
        let resp = self
            .post(&format!("/games/{}/start", game_id), &serde_json::json!({}))
            .await?;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await?;
        Ok(body["initiative_order"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect())
    }

    /// Submit an action for a character, returning the raw response
    pub async fn act(
        &self,
        game_id: &str,
        character_id: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response> {
        self.post(
            &format!("/games/{}/characters/{}/action", game_id, character_id),
            body,
        )
        .await
    }

    /// Get the WebSocket URL for a game
    pub fn ws_url(&self, game_id: &str, character_id: &str) -> String {
        format!(
            "ws://{}/games/{}/ws?character_id={}",
            self.addr, game_id, character_id
        )
    }

    /// Connect to a game's WebSocket endpoint and return a test client
    pub async fn connect_ws(&self, game_id: &str, character_id: &str) -> Result<WsClient> {
        let (ws_stream, _) = connect_async(&self.ws_url(game_id, character_id)).await?;
        let (write, read) = ws_stream.split();
        Ok(WsClient { write, read })
    }
}

/// WebSocket client for testing
pub struct WsClient {
    write: futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        Message,
    >,
    read: futures_util::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    >,
}

impl WsClient {
    /// Receive the next message as JSON
    pub async fn recv_json(&mut self) -> Result<serde_json::Value> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(serde_json::from_str(&text)?);
                }
                Some(Ok(Message::Close(_))) | None => {
                    anyhow::bail!("WebSocket closed");
                }
                _ => continue, // Skip binary/ping/pong frames
            }
        }
    }

    /// Receive with timeout
    pub async fn recv_json_timeout(&mut self, timeout: Duration) -> Result<serde_json::Value> {
        match tokio::time::timeout(timeout, self.recv_json()).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("Timeout waiting for WebSocket message"),
        }
    }

    /// Close the connection
    pub async fn close(&mut self) -> Result<()> {
        self.write.close().await?;
        Ok(())
    }
}

impl Drop for ArenaTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}
