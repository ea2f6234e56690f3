/// Realtime WebSocket endpoint
///
/// Clients connect to `GET /ws?user=<id>&chatList=<id,...>` and exchange JSON
/// text frames of the form `{"event": ..., "data": ...}`.
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;

use crate::realtime::{
    ClientSignal, HandshakeQuery, RealtimeConnection, RealtimeHub, ServerEvent,
};
use crate::state::AppState;

/// Server event forwarded from the hub to the socket
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct Outbound(ServerEvent);

pub struct WsSession {
    hub: RealtimeHub,
    connection: Arc<Mutex<RealtimeConnection>>,
    events: Option<UnboundedReceiver<ServerEvent>>,
    hb: Instant,
    heartbeat_interval: Duration,
    client_timeout: Duration,
}

impl WsSession {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let client_timeout = self.client_timeout;
        ctx.run_interval(self.heartbeat_interval, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > client_timeout {
                tracing::warn!("Realtime client heartbeat timed out, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_text(&self, text: &str) {
        let signal = match serde_json::from_str::<ClientSignal>(text) {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse realtime signal");
                return;
            }
        };

        let hub = self.hub.clone();
        let connection = self.connection.clone();
        actix::spawn(async move {
            let mut connection = connection.lock().await;
            hub.handle_signal(&mut connection, signal).await;
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);

        // Forward hub events into the actor until either side goes away
        if let Some(mut events) = self.events.take() {
            let addr = ctx.address();
            actix::spawn(async move {
                while let Some(event) = events.recv().await {
                    if !addr.connected() {
                        break;
                    }
                    addr.do_send(Outbound(event));
                }
            });
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        let hub = self.hub.clone();
        let connection = self.connection.clone();
        actix::spawn(async move {
            let mut connection = connection.lock().await;
            hub.disconnect(&mut connection).await;
            tracing::info!(user_id = %connection.user, "Realtime session stopped");
        });
    }
}

impl Handler<Outbound> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        match serde_json::to_string(&msg.0) {
            Ok(text) => ctx.text(text),
            Err(e) => tracing::error!(error = %e, "Failed to encode realtime event"),
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                self.handle_text(&text);
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket protocol error");
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// GET /ws
/// Upgrade to a realtime session joined to the user's rooms
#[get("/ws")]
pub async fn realtime_socket(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<HandshakeQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let handshake = query.parse()?;
    let (connection, events) = state.hub.connect(&handshake).await;

    tracing::info!(
        user_id = %handshake.user,
        chats = handshake.chats.len(),
        "Realtime session started"
    );

    let connection = Arc::new(Mutex::new(connection));
    let session = WsSession {
        hub: state.hub.clone(),
        connection: connection.clone(),
        events: Some(events),
        hb: Instant::now(),
        heartbeat_interval: Duration::from_secs(state.realtime.heartbeat_interval_secs.max(1)),
        client_timeout: Duration::from_secs(state.realtime.client_timeout_secs.max(1)),
    };

    let response = ws::start(session, &req, stream);
    if response.is_err() {
        // Upgrade refused, the session never started
        state.hub.disconnect(&mut *connection.lock().await).await;
    }
    response
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(realtime_socket);
}
