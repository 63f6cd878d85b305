//! Room actor implementation
//!
//! Each room runs one actor task that owns its membership and history.
//! Every mutation arrives as a [`RoomCommand`] on the actor's mailbox and is
//! applied in arrival order, so no locks guard room state.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::delivery::{self, Delivery, DeliveryChannel, DeliverySender, Frame};
use crate::error::{AppError, SendError};
use crate::ids::IdGenerator;
use crate::model::{Message, User};
use crate::room::{Member, RoomState};
use crate::types::{RoomId, UserId};

/// Commands queued for a room actor
#[derive(Debug)]
pub enum RoomCommand {
    /// A user joins, replacing any existing membership with the same ID
    Enter {
        user: User,
        sender: DeliverySender,
    },
    /// A user leaves; unknown IDs are ignored
    Leave {
        user_id: UserId,
    },
    /// Validate, record and fan out a message
    Send {
        from: UserId,
        to: UserId,
        txt: String,
        private: bool,
        respond_to: oneshot::Sender<Result<Message, SendError>>,
    },
    /// History snapshot filtered for one user
    FetchLog {
        user_id: UserId,
        respond_to: oneshot::Sender<Vec<Message>>,
    },
    /// Discard the history
    ClearLog,
    /// Current roster
    Roster {
        respond_to: oneshot::Sender<Vec<User>>,
    },
}

/// Tunables shared by every room
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Directory holding the `r-<id>-log` audit files
    pub log_dir: PathBuf,
    /// Longest a single delivery may wait on a full recipient buffer
    pub delivery_timeout: Duration,
    /// Mailbox capacity of each actor
    pub mailbox: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("."),
            delivery_timeout: Duration::from_secs(5),
            mailbox: 256,
        }
    }
}

/// Counters the actor publishes for read-only use outside it
#[derive(Debug, Default)]
struct RoomStats {
    occupants: AtomicUsize,
    dropped: Arc<AtomicU64>,
}

/// The actor owning one room
pub struct RoomActor {
    id: RoomId,
    state: RoomState,
    ids: Arc<IdGenerator>,
    stats: Arc<RoomStats>,
    audit: File,
    delivery_timeout: Duration,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Open the room's audit file and start its actor task
    ///
    /// Failing to open the audit file is fatal to the room.
    pub async fn spawn(
        id: RoomId,
        name: &str,
        password: &str,
        settings: &RoomSettings,
        ids: Arc<IdGenerator>,
    ) -> Result<RoomHandle, AppError> {
        let audit = open_audit_file(&settings.log_dir, id).await?;
        Ok(Self::start(id, name, password, settings, ids, audit))
    }

    /// Start the actor task over an already opened audit file
    fn start(
        id: RoomId,
        name: &str,
        password: &str,
        settings: &RoomSettings,
        ids: Arc<IdGenerator>,
        audit: File,
    ) -> RoomHandle {
        let (sender, receiver) = mpsc::channel(settings.mailbox);
        let stats = Arc::new(RoomStats::default());

        let actor = RoomActor {
            id,
            state: RoomState::new(),
            ids,
            stats: Arc::clone(&stats),
            audit,
            delivery_timeout: settings.delivery_timeout,
            receiver,
        };
        tokio::spawn(actor.run());

        RoomHandle {
            id,
            name: Arc::from(name),
            password: Arc::from(password),
            sender,
            stats,
        }
    }

    /// Run the room event loop
    ///
    /// Processes commands until every handle is dropped.
    pub async fn run(mut self) {
        info!(room = %self.id, "Room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!(room = %self.id, "Room actor shutting down");
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Enter { user, sender } => {
                self.handle_enter(user, sender).await;
            }
            RoomCommand::Leave { user_id } => {
                self.handle_leave(&user_id).await;
            }
            RoomCommand::Send {
                from,
                to,
                txt,
                private,
                respond_to,
            } => {
                let result = self.handle_send(from, to, txt, private).await;
                let _ = respond_to.send(result);
            }
            RoomCommand::FetchLog {
                user_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.state.history().snapshot(&user_id));
            }
            RoomCommand::ClearLog => {
                self.state.history_mut().clear();
                info!(room = %self.id, "History cleared");
            }
            RoomCommand::Roster { respond_to } => {
                let _ = respond_to.send(self.state.roster());
            }
        }
    }

    /// Handle a user entering
    ///
    /// The newcomer gets its history snapshot first, then everyone gets the
    /// new roster. A replaced membership is closed before the roster goes out.
    async fn handle_enter(&mut self, user: User, mut sender: DeliverySender) {
        self.audit_line(&format!(
            "[user]: {} {} {} enter\n",
            user.id, user.name, user.ip
        ))
        .await;

        let snapshot = self.state.history().snapshot(&user.id);
        if sender.deliver(Frame::Log(snapshot), self.delivery_timeout, &self.stats.dropped)
            == Delivery::Closed
        {
            debug!(room = %self.id, user = %user.id, "Entering connection already gone");
        }

        let user_id = user.id.clone();
        if let Some(old) = self.state.enter(user, sender) {
            info!(room = %self.id, user = %user_id, "Replacing existing membership, closing old connection");
            old.close();
        } else {
            info!(room = %self.id, user = %user_id, "User entered");
        }

        self.publish_occupants();
        self.broadcast_roster();
    }

    /// Handle a user leaving
    async fn handle_leave(&mut self, user_id: &str) {
        let Some(member) = self.state.leave(user_id) else {
            debug!(room = %self.id, user = %user_id, "Leave for absent user ignored");
            return;
        };

        let user = &member.user;
        self.audit_line(&format!(
            "[user]: {} {} {} leave\n",
            user.id, user.name, user.ip
        ))
        .await;
        info!(room = %self.id, user = %user_id, "User left");

        // Dropping the member releases its delivery channel
        drop(member);

        self.publish_occupants();
        self.broadcast_roster();
    }

    /// Handle a message send
    async fn handle_send(
        &mut self,
        from: UserId,
        to: UserId,
        txt: String,
        private: bool,
    ) -> Result<Message, SendError> {
        if let Err(e) = self.state.validate_send(&from, &to, &txt) {
            debug!(room = %self.id, from = %from, "Send rejected: {}", e);
            return Err(e);
        }

        let msg = Message::new(&self.ids, from, to, txt, private);
        self.state.history_mut().append(msg.clone());

        match serde_json::to_string(&msg) {
            Ok(json) => self.audit_line(&format!("[msg]{}\n", json)).await,
            Err(e) => warn!(room = %self.id, "Failed to serialize message for audit: {}", e),
        }

        for member in self.state.recipients(&msg) {
            deliver_to(
                self.id,
                member,
                Frame::Message(msg.clone()),
                self.delivery_timeout,
                &self.stats.dropped,
            );
        }

        debug!(room = %self.id, id = %msg.id, private = msg.private, "Message sent");
        Ok(msg)
    }

    /// Send the full roster to every member
    fn broadcast_roster(&mut self) {
        let roster = self.state.roster();
        for member in self.state.members_mut() {
            deliver_to(
                self.id,
                member,
                Frame::Roster(roster.clone()),
                self.delivery_timeout,
                &self.stats.dropped,
            );
        }
    }

    fn publish_occupants(&self) {
        self.stats
            .occupants
            .store(self.state.member_count(), Ordering::Relaxed);
    }

    /// Append to the audit file; failures are logged and ignored
    async fn audit_line(&mut self, line: &str) {
        let written = match self.audit.write_all(line.as_bytes()).await {
            Ok(()) => self.audit.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!(room = %self.id, "Audit write failed: {}", e);
        }
    }
}

/// Deliver one frame to a member without waiting on it
fn deliver_to(
    room: RoomId,
    member: &mut Member,
    frame: Frame,
    timeout: Duration,
    dropped: &Arc<AtomicU64>,
) {
    match member.sender.deliver(frame, timeout, dropped) {
        Delivery::Queued => {}
        Delivery::Pending => {
            debug!(room = %room, user = %member.user.id, "Recipient is behind, delivery waiting");
        }
        Delivery::Closed => {
            debug!(room = %room, user = %member.user.id, "Recipient connection gone");
        }
    }
}

/// Path of a room's audit file
pub fn audit_path(log_dir: &Path, id: RoomId) -> PathBuf {
    log_dir.join(format!("r-{}-log", id))
}

async fn open_audit_file(log_dir: &Path, id: RoomId) -> Result<File, AppError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(audit_path(log_dir, id))
        .await?;
    Ok(file)
}

/// Cloneable handle to a running room
///
/// Commands go through the actor's mailbox; the counters are read-only
/// mirrors the actor keeps current.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: RoomId,
    name: Arc<str>,
    password: Arc<str>,
    sender: mpsc::Sender<RoomCommand>,
    stats: Arc<RoomStats>,
}

impl RoomHandle {
    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the room is password protected
    pub fn is_private(&self) -> bool {
        !self.password.is_empty()
    }

    /// Compare a submitted password with the room's
    pub fn password_matches(&self, password: &str) -> bool {
        *self.password == *password
    }

    /// Number of present members
    pub fn occupants(&self) -> usize {
        self.stats.occupants.load(Ordering::Relaxed)
    }

    /// Deliveries dropped because a recipient did not drain in time
    pub fn dropped_deliveries(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }

    /// Join the room, returning the channel this membership is fed through
    pub async fn enter(&self, user: User) -> Result<DeliveryChannel, AppError> {
        let (sender, channel) = delivery::channel();
        self.command(RoomCommand::Enter { user, sender }).await?;
        Ok(channel)
    }

    pub async fn leave(&self, user_id: &str) -> Result<(), AppError> {
        self.command(RoomCommand::Leave {
            user_id: user_id.to_string(),
        })
        .await
    }

    /// Send a message; resolves once the room accepted or rejected it
    pub async fn send(
        &self,
        from: &str,
        to: &str,
        txt: &str,
        private: bool,
    ) -> Result<Message, AppError> {
        let (respond_to, response) = oneshot::channel();
        self.command(RoomCommand::Send {
            from: from.to_string(),
            to: to.to_string(),
            txt: txt.to_string(),
            private,
            respond_to,
        })
        .await?;
        let msg = response.await.map_err(|_| AppError::ChannelSend)??;
        Ok(msg)
    }

    pub async fn fetch_log(&self, user_id: &str) -> Result<Vec<Message>, AppError> {
        let (respond_to, response) = oneshot::channel();
        self.command(RoomCommand::FetchLog {
            user_id: user_id.to_string(),
            respond_to,
        })
        .await?;
        response.await.map_err(|_| AppError::ChannelSend)
    }

    pub async fn clear_log(&self) -> Result<(), AppError> {
        self.command(RoomCommand::ClearLog).await
    }

    pub async fn roster(&self) -> Result<Vec<User>, AppError> {
        let (respond_to, response) = oneshot::channel();
        self.command(RoomCommand::Roster { respond_to }).await?;
        response.await.map_err(|_| AppError::ChannelSend)
    }

    async fn command(&self, cmd: RoomCommand) -> Result<(), AppError> {
        self.sender.send(cmd).await.map_err(|_| AppError::ChannelSend)
    }
}
