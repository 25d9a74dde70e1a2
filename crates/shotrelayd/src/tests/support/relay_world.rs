//! World for end-to-end relay scenarios: a running daemon plus test agents.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::agent::{self, AgentSocket, SocketQueue};
use crate::bootstrap::{Daemon, bootstrap_with};
use crate::caller::{CallerHandle, Delivery, RecordingCaller};
use crate::clock::{Clock, SystemClock};
use crate::dispatcher::DispatchOutcome;
use crate::protocol::CloseReason;
use crate::registry::AgentRegistration;
use crate::runtime::Runtime;

use super::agent_client::{Greeting, TestAgent};
use super::config_loader::TestConfigLoader;
use super::reporter::RecordingHealthReporter;

const WAIT: Duration = Duration::from_secs(5);

/// A running relay with the agents a scenario connected.
pub struct RelayWorld {
    loader: TestConfigLoader,
    daemon: Daemon,
    runtime: Option<Runtime>,
    agents: Vec<(TestAgent, Greeting)>,
    caller: Arc<RecordingCaller>,
    outcome: Option<DispatchOutcome>,
    capture_token: Option<String>,
    detached: Vec<SocketQueue>,
}

impl RelayWorld {
    /// Bootstraps and starts a relay admitting at most `max_clients` agents.
    #[must_use]
    pub fn start(max_clients: usize) -> Self {
        let loader = TestConfigLoader::with_max_clients(max_clients);
        let daemon = bootstrap_with(&loader, Arc::new(RecordingHealthReporter::default()))
            .expect("bootstrap succeeds");
        let runtime = Runtime::start(&daemon).expect("runtime starts");
        Self {
            loader,
            daemon,
            runtime: Some(runtime),
            agents: Vec::new(),
            caller: Arc::new(RecordingCaller::default()),
            outcome: None,
            capture_token: None,
            detached: Vec::new(),
        }
    }

    /// Loader the relay was started with.
    #[must_use]
    pub const fn loader(&self) -> &TestConfigLoader {
        &self.loader
    }

    /// The running daemon.
    #[must_use]
    pub const fn daemon(&self) -> &Daemon {
        &self.daemon
    }

    /// Connects an agent and records the relay's answer to its `auth` frame.
    pub fn authenticate(&mut self, token: &str, name: &str) -> Greeting {
        let addr = self
            .runtime
            .as_ref()
            .and_then(Runtime::agent_addr)
            .expect("agent listener is bound to TCP");
        let (agent, greeting) = TestAgent::authenticate(addr, token, name);
        self.agents.push((agent, greeting.clone()));
        greeting
    }

    /// Connects an agent whose first frame is `frame` instead of `auth`.
    pub fn send_first_frame(&mut self, frame: &str) -> Greeting {
        let addr = self
            .runtime
            .as_ref()
            .and_then(Runtime::agent_addr)
            .expect("agent listener is bound to TCP");
        let mut agent = TestAgent::connect(addr);
        agent.send(frame);
        let greeting = agent.greeting();
        self.agents.push((agent, greeting.clone()));
        greeting
    }

    /// Connects an agent whose first frame is binary.
    pub fn send_binary_first(&mut self, bytes: &[u8]) -> Greeting {
        let addr = self
            .runtime
            .as_ref()
            .and_then(Runtime::agent_addr)
            .expect("agent listener is bound to TCP");
        let mut agent = TestAgent::connect(addr);
        agent.send_binary(bytes);
        let greeting = agent.greeting();
        self.agents.push((agent, greeting.clone()));
        greeting
    }

    /// Hands over every connected agent, leaving none in the world.
    pub fn take_agents(&mut self) -> Vec<TestAgent> {
        self.agents.drain(..).map(|(agent, _)| agent).collect()
    }

    /// Greeting of the most recently connected agent.
    #[must_use]
    pub fn last_greeting(&self) -> &Greeting {
        &self.agents.last().expect("an agent connected").1
    }

    /// Mutable access to the first accepted agent.
    pub fn accepted_agent(&mut self) -> &mut TestAgent {
        self.agents
            .iter_mut()
            .find(|(_, greeting)| matches!(greeting, Greeting::Accepted(_)))
            .map(|(agent, _)| agent)
            .expect("an agent was accepted")
    }

    /// Registers an agent whose connection is already closed.
    pub fn register_detached_agent(&mut self, id: &str) {
        let (socket, queue) = agent::channel();
        socket.close(CloseReason::Operator);
        self.daemon
            .broker()
            .registry()
            .register(
                AgentRegistration {
                    id: id.to_owned(),
                    display_name: id.to_owned(),
                    socket,
                    admitted_at: SystemClock.now(),
                },
                10,
            )
            .expect("registry has room");
        self.detached.push(queue);
    }

    /// Dispatches a capture on behalf of the recording caller.
    pub fn dispatch(&mut self, target: Option<&str>) {
        let caller = Arc::clone(&self.caller) as Arc<dyn CallerHandle>;
        self.outcome = Some(self.daemon.broker().dispatch(target, caller));
    }

    /// Outcome of the last dispatch.
    #[must_use]
    pub fn outcome(&self) -> &DispatchOutcome {
        self.outcome.as_ref().expect("a capture was dispatched")
    }

    /// Remembers the token of a capture frame received by the agent.
    pub fn receive_capture(&mut self) -> String {
        let frame = self
            .accepted_agent()
            .recv_text()
            .expect("agent receives a frame");
        let token = frame
            .strip_prefix("capture:")
            .unwrap_or_else(|| panic!("unexpected frame {frame}"))
            .to_owned();
        self.capture_token = Some(token.clone());
        token
    }

    /// Answers the remembered capture with an image.
    pub fn answer_image(&mut self, payload: &str) {
        let token = self.capture_token.clone().expect("a capture was received");
        self.accepted_agent()
            .send(&format!("image:{token}:{payload}"));
    }

    /// Waits until the recording caller has a delivery.
    #[must_use]
    pub fn await_delivery(&self) -> Vec<Delivery> {
        let deadline = Instant::now() + WAIT;
        loop {
            let deliveries = self.caller.deliveries();
            if !deliveries.is_empty() || Instant::now() >= deadline {
                return deliveries;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Number of outstanding captures.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.daemon.broker().pending().len()
    }

    /// Number of registered agents.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.daemon.broker().list_agents().len()
    }

    /// Polls until `condition` holds or the wait budget runs out.
    pub fn eventually(&self, condition: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if condition(self) {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        condition(self)
    }
}

impl Drop for RelayWorld {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = runtime.stop();
        }
    }
}
