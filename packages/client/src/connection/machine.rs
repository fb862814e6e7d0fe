//! Pure connection state machine.
//!
//! The machine owns the connection intent, the retry counter and the
//! generation numbers of transport attempts and reconnect timers. It never
//! performs I/O: every event returns the commands the driver must execute.
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - 状態遷移（Disconnected → Connecting → Connected → Reconnecting → …）
//! - バックオフの順序とリセット、可視化復帰による即時再接続
//! - 明示的な切断と、古い試行・タイマーからのイベントの無視

use std::time::Duration;

/// Transport state as seen by the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

/// Input of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    ConnectRequested,
    /// Transport of the given attempt is open
    Opened { attempt: u64 },
    /// Transport of the given attempt failed to open or closed
    Closed { attempt: u64 },
    /// Reconnect timer of the given generation elapsed
    TimerFired { timer: u64 },
    /// The view became visible again
    VisibilityRegained,
    ExplicitDisconnect,
}

/// Output of the machine, executed by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    OpenTransport { attempt: u64 },
    CloseTransport,
    ScheduleReconnect { delay: Duration, timer: u64 },
    CancelReconnect,
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    /// The view wants to be connected
    intent: bool,
    retry_count: u32,
    attempt: u64,
    timer: u64,
    timer_pending: bool,
    backoff: Vec<Duration>,
}

impl ConnectionMachine {
    /// `backoff` must not be empty; an empty table falls back to one second.
    pub fn new(backoff: Vec<Duration>) -> Self {
        let backoff = if backoff.is_empty() {
            vec![Duration::from_secs(1)]
        } else {
            backoff
        };
        Self {
            state: ConnectionState::Disconnected,
            intent: false,
            retry_count: 0,
            attempt: 0,
            timer: 0,
            timer_pending: false,
            backoff,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Attempt number of the transport currently wanted
    pub fn current_attempt(&self) -> u64 {
        self.attempt
    }

    /// `true` once an explicit disconnect has been handled
    pub fn is_terminated(&self) -> bool {
        !self.intent && self.state == ConnectionState::Disconnected && self.attempt > 0
    }

    /// Delay used after `retry_count` consecutive failures
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let index = (retry_count as usize).min(self.backoff.len() - 1);
        self.backoff[index]
    }

    pub fn handle(&mut self, event: ClientEvent) -> Vec<Command> {
        match event {
            ClientEvent::ConnectRequested => {
                self.intent = true;
                match self.state {
                    ConnectionState::Disconnected | ConnectionState::Reconnecting => {
                        self.open_now()
                    }
                    ConnectionState::Connecting | ConnectionState::Connected => Vec::new(),
                }
            }
            ClientEvent::Opened { attempt } => {
                if attempt != self.attempt || self.state != ConnectionState::Connecting {
                    return Vec::new();
                }
                self.state = ConnectionState::Connected;
                self.retry_count = 0;
                Vec::new()
            }
            ClientEvent::Closed { attempt } => {
                if attempt != self.attempt
                    || !matches!(
                        self.state,
                        ConnectionState::Connecting | ConnectionState::Connected
                    )
                {
                    return Vec::new();
                }
                if !self.intent {
                    self.state = ConnectionState::Disconnected;
                    return Vec::new();
                }
                let delay = self.backoff_delay(self.retry_count);
                self.retry_count = self.retry_count.saturating_add(1);
                self.timer += 1;
                self.timer_pending = true;
                self.state = ConnectionState::Reconnecting;
                vec![Command::ScheduleReconnect {
                    delay,
                    timer: self.timer,
                }]
            }
            ClientEvent::TimerFired { timer } => {
                if timer != self.timer
                    || !self.timer_pending
                    || !self.intent
                    || self.state != ConnectionState::Reconnecting
                {
                    return Vec::new();
                }
                self.timer_pending = false;
                self.open_now()
            }
            ClientEvent::VisibilityRegained => {
                if !self.intent {
                    return Vec::new();
                }
                match self.state {
                    // transport open or an attempt already in flight
                    ConnectionState::Connected | ConnectionState::Connecting => Vec::new(),
                    ConnectionState::Reconnecting | ConnectionState::Disconnected => {
                        self.retry_count = 0;
                        self.open_now()
                    }
                }
            }
            ClientEvent::ExplicitDisconnect => {
                self.intent = false;
                let mut commands = Vec::new();
                if self.timer_pending {
                    self.timer_pending = false;
                    commands.push(Command::CancelReconnect);
                }
                if matches!(
                    self.state,
                    ConnectionState::Connecting | ConnectionState::Connected
                ) {
                    commands.push(Command::CloseTransport);
                }
                // late results of the closed attempt must be ignored
                self.attempt += 1;
                self.state = ConnectionState::Disconnected;
                commands
            }
        }
    }

    fn open_now(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        if self.timer_pending {
            self.timer_pending = false;
            commands.push(Command::CancelReconnect);
        }
        self.attempt += 1;
        self.state = ConnectionState::Connecting;
        commands.push(Command::OpenTransport {
            attempt: self.attempt,
        });
        commands
    }
}
