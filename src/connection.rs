use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tracing::Level;

use crate::backoff::Backoff;
use crate::config::{BackoffMax, Config};
use crate::connector::Connector;
use crate::event::{ConnectionId, Event, EventKind};
use crate::ledger::Ledger;
use crate::protocol::PubSubFrame;
use crate::reader::Reader;
use crate::registry::Registry;
use crate::resp::Frame;
use crate::shutdown::Shutdown;
use crate::subscriber::{Subscriber, SubscriberRef};
use crate::target::Target;
use crate::writer::Writer;
use crate::Error;

/// A call from a [`PubSubClient`](crate::PubSubClient) handle into the
/// single-writer connection task.
///
/// `Subscribe`/`Unsubscribe` cover both the channel and pattern variants:
/// the caller tags each name as [`Target::Channel`] or [`Target::Pattern`]
/// before building the request, so the ledger (already generic over
/// `Target`) needs no separate code path for `PSUBSCRIBE`.
#[derive(Debug)]
pub(crate) enum Request {
    Subscribe { targets: Vec<Target>, subscriber: Subscriber, reply: oneshot::Sender<SubscriberRef> },
    Unsubscribe { targets: Vec<Target>, subscriber: Subscriber, reply: oneshot::Sender<()> },
    SubscriberDied(SubscriberRef),
}

/// Why a connected phase ended.
enum Disconnect {
    /// The transport failed, was closed by the peer, or sent a malformed
    /// frame. Carries the reason reported to subscribers and logs.
    Transport(String),
    /// The client (or the process) asked the connection to stop.
    Shutdown,
}

struct ConnectionContext {
    ledger: Ledger,
    registry: Registry,
    id: ConnectionId,
    self_tx: mpsc::Sender<Request>,
    last_disconnect_reason: Option<String>,
}

impl ConnectionContext {
    fn notify(&self, subscriber: SubscriberRef, kind: EventKind) {
        self.registry.deliver(subscriber, Event { connection: self.id, subscriber, kind });
    }

    fn notify_all_disconnected(&self, reason: &str) {
        for subscriber in self.ledger.all_subscribers() {
            self.notify(subscriber, EventKind::Disconnected { reason: reason.to_string() });
        }
    }
}

/// Drives the reconnecting state machine for the lifetime of a
/// [`PubSubClient`](crate::PubSubClient).
///
/// Begins directly in the spec's `disconnected` state and immediately
/// attempts a connect — the source's `needs-bootstrap` state exists only to
/// decouple process start-up from the first connect attempt inside a
/// mailbox-per-process runtime; spawning this function as its own task
/// already provides that decoupling, so no extra state is modelled (see
/// `SPEC_FULL.md`'s "Startup quirk" note).
///
/// `initial_transport` is `Some` when the caller used `sync_connect` and
/// already has an open socket in hand; the machine skips straight to the
/// connected phase with it.
pub(crate) async fn run<C: Connector>(
    config: Config,
    connector: C,
    mut request_rx: mpsc::Receiver<Request>,
    self_tx: mpsc::Sender<Request>,
    shutdown_rx: tokio::sync::broadcast::Receiver<()>,
    initial_transport: Option<(C::Transport, SocketAddr)>,
) {
    let mut ctx = ConnectionContext {
        ledger: Ledger::default(),
        registry: Registry::default(),
        id: ConnectionId::new(),
        self_tx,
        last_disconnect_reason: None,
    };
    let mut backoff = Backoff::new(config.backoff_initial, backoff_cap(config.backoff_max));
    let mut shutdown = Shutdown::new(shutdown_rx);
    let mut pending_transport = initial_transport;
    // The very first connect attempt (the "needs-bootstrap" kick) fires
    // immediately with no backoff delay; every later entry into the
    // disconnected phase follows a real disconnection and waits out the
    // backoff timer as normal.
    let mut bootstrapping = pending_transport.is_none();

    loop {
        if shutdown.is_shutdown() {
            return;
        }

        let (transport, peer) = match pending_transport.take() {
            Some(transport) => transport,
            None => {
                match disconnected_phase(
                    &config,
                    &connector,
                    &mut ctx,
                    &mut request_rx,
                    &mut backoff,
                    &mut shutdown,
                    bootstrapping,
                )
                .await
                {
                    Some(transport) => transport,
                    None => return,
                }
            }
        };
        bootstrapping = false;

        backoff.reset();
        ctx.ledger.purge_empty_pending();
        let (mut reader, mut writer) = split_transport(transport);

        let outcome = match resubscribe_everything(&mut writer, &ctx).await {
            Ok(()) => {
                log_at(config.log.reconnection, &format!("connected to {}://{peer}", scheme(config.ssl)));
                run_connected(&mut reader, &mut writer, &mut ctx, &mut request_rx, &mut shutdown).await
            }
            Err(reason) => Disconnect::Transport(reason),
        };

        match outcome {
            Disconnect::Shutdown => return,
            Disconnect::Transport(reason) => {
                let reason = format!("{} connection: {reason}", scheme(config.ssl));
                if config.exit_on_disconnection {
                    ctx.notify_all_disconnected(&reason);
                    return;
                }
                log_at(config.log.disconnection, &format!("disconnected, will reconnect: {reason}"));
                ctx.notify_all_disconnected(&reason);
                ctx.ledger.on_disconnect_reset();
                ctx.last_disconnect_reason = Some(reason);
            }
        }
    }
}

/// Logs at the severity configured for this connection-lifecycle event.
/// `tracing`'s `event!`/`info!`/... macros require a level known at compile
/// time, so a runtime [`Level`] (from [`Config::log`]) is dispatched through
/// this match instead of passed directly to the macro.
fn log_at(level: Level, message: &str) {
    if level == Level::ERROR {
        tracing::error!("{message}");
    } else if level == Level::WARN {
        tracing::warn!("{message}");
    } else if level == Level::INFO {
        tracing::info!("{message}");
    } else if level == Level::DEBUG {
        tracing::debug!("{message}");
    } else {
        tracing::trace!("{message}");
    }
}

/// Tags log lines and disconnect reasons with the transport kind, per
/// [`ConfigBuilder::ssl`](crate::ConfigBuilder::ssl)'s documented effect on
/// "closed/error event tags".
fn scheme(ssl: bool) -> &'static str {
    if ssl {
        "rediss"
    } else {
        "redis"
    }
}

fn backoff_cap(max: BackoffMax) -> Option<std::time::Duration> {
    match max {
        BackoffMax::Infinite => None,
        BackoffMax::Millis(ms) => Some(std::time::Duration::from_millis(ms)),
    }
}

fn split_transport<T: AsyncRead + AsyncWrite + Unpin>(
    transport: T,
) -> (Reader<tokio::io::ReadHalf<T>>, Writer<tokio::io::WriteHalf<T>>) {
    let (read_half, write_half) = tokio::io::split(transport);
    (Reader::new(read_half), Writer::new(write_half))
}

/// Disconnected state: accepts subscribe/unsubscribe requests (ledger-only,
/// per §4.1), waits out the backoff timer, and retries the connect.
///
/// `bootstrapping` is `true` only for the very first connect attempt of the
/// connection's lifetime: that attempt fires with zero delay (§4.1's
/// "immediate internal `connect` event"), not the backoff schedule, which is
/// reserved for retries after a real disconnection (§4.5).
async fn disconnected_phase<C: Connector>(
    config: &Config,
    connector: &C,
    ctx: &mut ConnectionContext,
    request_rx: &mut mpsc::Receiver<Request>,
    backoff: &mut Backoff,
    shutdown: &mut Shutdown,
    bootstrapping: bool,
) -> Option<(C::Transport, SocketAddr)> {
    let mut delay = if bootstrapping { std::time::Duration::ZERO } else { backoff.next() };

    loop {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => break,
                maybe_req = request_rx.recv() => {
                    match maybe_req {
                        Some(req) => handle_request_while_disconnected(req, ctx),
                        None => return None,
                    }
                }
                _ = shutdown.recv() => return None,
            }
        }

        match connector.connect(&config.host, config.port).await {
            Ok((transport, peer)) => return Some((transport, peer)),
            Err(err) => {
                log_at(
                    config.log.failed_connection,
                    &format!("failed to connect to {}://{}:{}: {err}", scheme(config.ssl), config.host, config.port),
                );
                if config.exit_on_disconnection {
                    return None;
                }
                delay = backoff.next();
            }
        }
    }
}

fn handle_request_while_disconnected(req: Request, ctx: &mut ConnectionContext) {
    match req {
        Request::Subscribe { targets, subscriber, reply } => {
            let id = ctx.registry.acquire(&subscriber, ctx.self_tx.clone());
            ctx.ledger.add_interest(&targets, id);
            let _ = reply.send(id);
            let reason = ctx
                .last_disconnect_reason
                .clone()
                .unwrap_or_else(|| "not yet connected".to_string());
            ctx.notify(id, EventKind::Disconnected { reason });
        }
        Request::Unsubscribe { targets, subscriber, reply } => {
            let id = subscriber.subscriber_ref();
            let outcome = ctx.ledger.remove_interest(&targets, id);
            let _ = reply.send(());
            for target in outcome.removed {
                ctx.notify(id, unsubscribed_event(&target));
            }
            ctx.registry.release_if_idle(id, &ctx.ledger);
        }
        Request::SubscriberDied(id) => {
            ctx.ledger.drop_subscriber(id);
            ctx.registry.release_if_idle(id, &ctx.ledger);
        }
    }
}

/// Connected state: demultiplexes socket reads, client requests, and the
/// shutdown signal in a single `select!`, matching the teacher's
/// `Handler::run` merge of `reader.read_frame()`, a request channel, and
/// `shutdown.recv()`.
async fn run_connected<R, W>(
    reader: &mut Reader<R>,
    writer: &mut Writer<W>,
    ctx: &mut ConnectionContext,
    request_rx: &mut mpsc::Receiver<Request>,
    shutdown: &mut Shutdown,
) -> Disconnect
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            frame = reader.read_frame() => {
                match frame {
                    Ok(Some(raw)) => match PubSubFrame::from_frame(raw) {
                        Ok(parsed) => {
                            if let Err(reason) = dispatch_frame(parsed, ctx, writer).await {
                                return Disconnect::Transport(reason);
                            }
                        }
                        Err(err) => return Disconnect::Transport(err.to_string()),
                    },
                    Ok(None) => return Disconnect::Transport("connection closed by peer".to_string()),
                    Err(err) => return Disconnect::Transport(err.to_string()),
                }
            }
            maybe_req = request_rx.recv() => {
                match maybe_req {
                    Some(req) => {
                        if let Err(reason) = handle_request_while_connected(req, ctx, writer).await {
                            return Disconnect::Transport(reason);
                        }
                    }
                    None => return Disconnect::Shutdown,
                }
            }
            _ = shutdown.recv() => return Disconnect::Shutdown,
        }
    }
}

async fn handle_request_while_connected<W: AsyncWrite + Unpin>(
    req: Request,
    ctx: &mut ConnectionContext,
    writer: &mut Writer<W>,
) -> Result<(), String> {
    match req {
        Request::Subscribe { targets, subscriber, reply } => {
            let id = ctx.registry.acquire(&subscriber, ctx.self_tx.clone());
            let outcome = ctx.ledger.add_interest(&targets, id);
            let _ = reply.send(id);

            if !outcome.to_wire.is_empty() {
                let frames = build_wire_commands(&outcome.to_wire, true);
                writer.write_frames(&frames).await.map_err(|err| err.to_string())?;
            }

            for target in outcome.already_confirmed {
                ctx.notify(id, subscribed_event(&target));
            }
            Ok(())
        }
        Request::Unsubscribe { targets, subscriber, reply } => {
            let id = subscriber.subscriber_ref();
            let outcome = ctx.ledger.remove_interest(&targets, id);
            let _ = reply.send(());

            for target in &outcome.removed {
                ctx.notify(id, unsubscribed_event(target));
            }
            ctx.registry.release_if_idle(id, &ctx.ledger);

            if !outcome.to_wire.is_empty() {
                let frames = build_wire_commands(&outcome.to_wire, false);
                writer.write_frames(&frames).await.map_err(|err| err.to_string())?;
            }
            Ok(())
        }
        Request::SubscriberDied(id) => {
            let (channels, patterns) = ctx.ledger.drop_subscriber(id);
            ctx.registry.release_if_idle(id, &ctx.ledger);

            let mut orphans = channels;
            orphans.extend(patterns);
            if !orphans.is_empty() {
                let frames = build_wire_commands(&orphans, false);
                writer.write_frames(&frames).await.map_err(|err| err.to_string())?;
            }
            Ok(())
        }
    }
}

async fn dispatch_frame<W: AsyncWrite + Unpin>(
    frame: PubSubFrame,
    ctx: &mut ConnectionContext,
    writer: &mut Writer<W>,
) -> Result<(), String> {
    match frame {
        PubSubFrame::Subscribe { channel, .. } => {
            let target = Target::Channel(channel.clone());
            for subscriber in ctx.ledger.on_subscribe_confirmed(&target) {
                ctx.notify(subscriber, EventKind::Subscribed { channel: channel.clone() });
            }
        }
        PubSubFrame::Psubscribe { pattern, .. } => {
            let target = Target::Pattern(pattern.clone());
            for subscriber in ctx.ledger.on_subscribe_confirmed(&target) {
                ctx.notify(subscriber, EventKind::Psubscribed { pattern: pattern.clone() });
            }
        }
        PubSubFrame::Unsubscribe { channel, .. } => {
            let target = Target::Channel(channel.clone());
            if ctx.ledger.on_unsubscribe_confirmed(&target) {
                let frame = Frame::command(b"SUBSCRIBE", [channel]);
                writer.write_frames(&[frame]).await.map_err(|err| err.to_string())?;
            }
        }
        PubSubFrame::Punsubscribe { pattern, .. } => {
            let target = Target::Pattern(pattern.clone());
            if ctx.ledger.on_unsubscribe_confirmed(&target) {
                let frame = Frame::command(b"PSUBSCRIBE", [pattern]);
                writer.write_frames(&[frame]).await.map_err(|err| err.to_string())?;
            }
        }
        PubSubFrame::Message { channel, payload } => {
            let target = Target::Channel(channel.clone());
            let subscribers: Vec<_> = ctx.ledger.confirmed_subscribers(&target).copied().collect();
            for subscriber in subscribers {
                ctx.notify(subscriber, EventKind::Message { channel: channel.clone(), payload: payload.clone() });
            }
        }
        PubSubFrame::Pmessage { pattern, channel, payload } => {
            let target = Target::Pattern(pattern.clone());
            let subscribers: Vec<_> = ctx.ledger.confirmed_subscribers(&target).copied().collect();
            for subscriber in subscribers {
                ctx.notify(
                    subscriber,
                    EventKind::Pmessage { pattern: pattern.clone(), channel: channel.clone(), payload: payload.clone() },
                );
            }
        }
    }
    Ok(())
}

/// Issues `SUBSCRIBE`/`PSUBSCRIBE` for every target in `pending` (the full
/// interest set, per invariant 4) right after a (re)connect.
async fn resubscribe_everything<W: AsyncWrite + Unpin>(writer: &mut Writer<W>, ctx: &ConnectionContext) -> Result<(), String> {
    let pending: Vec<Target> = ctx.ledger.pending_targets().cloned().collect();
    if pending.is_empty() {
        return Ok(());
    }
    let frames = build_wire_commands(&pending, true);
    writer.write_frames(&frames).await.map_err(|err| err.to_string())
}

/// Builds the `SUBSCRIBE`/`PSUBSCRIBE` (or `UNSUBSCRIBE`/`PUNSUBSCRIBE`)
/// commands for a mixed list of targets. Channel and pattern targets are
/// sent as two independent RESP array commands in one transport write.
fn build_wire_commands(targets: &[Target], subscribing: bool) -> Vec<Frame> {
    let mut channels = Vec::new();
    let mut patterns = Vec::new();
    for target in targets {
        match target {
            Target::Channel(name) => channels.push(name.clone()),
            Target::Pattern(name) => patterns.push(name.clone()),
        }
    }

    let mut frames = Vec::with_capacity(2);
    if !channels.is_empty() {
        let verb: &'static [u8] = if subscribing { b"SUBSCRIBE" } else { b"UNSUBSCRIBE" };
        frames.push(Frame::command(verb, channels));
    }
    if !patterns.is_empty() {
        let verb: &'static [u8] = if subscribing { b"PSUBSCRIBE" } else { b"PUNSUBSCRIBE" };
        frames.push(Frame::command(verb, patterns));
    }
    frames
}

fn subscribed_event(target: &Target) -> EventKind {
    match target {
        Target::Channel(name) => EventKind::Subscribed { channel: name.clone() },
        Target::Pattern(name) => EventKind::Psubscribed { pattern: name.clone() },
    }
}

fn unsubscribed_event(target: &Target) -> EventKind {
    match target {
        Target::Channel(name) => EventKind::Unsubscribed { channel: name.clone() },
        Target::Pattern(name) => EventKind::Punsubscribed { pattern: name.clone() },
    }
}

/// Attempts the first connect synchronously, for [`Config::sync_connect`].
/// Failure here aborts `PubSubClient::connect` entirely rather than
/// scheduling a retry.
pub(crate) async fn connect_sync<C: Connector>(config: &Config, connector: &C) -> Result<(C::Transport, SocketAddr), Error> {
    connector
        .connect(&config.host, config.port)
        .await
        .map_err(|source| Error::Connect { host: config.host.clone(), port: config.port, source })
}
