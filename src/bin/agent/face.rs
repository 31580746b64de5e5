use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info, warn};
use voice_cart::transport::{Bridge, ChannelTransport, Envelope, MessageType};
use voice_cart::ExecutionResult;

/// Events streamed to the page via SSE.
#[derive(Clone, Debug)]
pub enum AgentEvent {
    Working { command: String },
    ActionDone { number: usize, success: bool, message: String },
    Speech { text: String },
    Failed { message: String },
    Ready,
}

impl AgentEvent {
    fn to_sse_event(&self) -> Event {
        match self {
            AgentEvent::Working { command } => Event::default()
                .event("working")
                .data(json!({ "command": command }).to_string()),
            AgentEvent::ActionDone {
                number,
                success,
                message,
            } => Event::default().event("action").data(
                json!({ "number": number, "success": success, "message": message }).to_string(),
            ),
            AgentEvent::Speech { text } => Event::default()
                .event("speech")
                .data(json!({ "text": text }).to_string()),
            AgentEvent::Failed { message } => Event::default()
                .event("failed")
                .data(json!({ "message": message }).to_string()),
            AgentEvent::Ready => Event::default().event("ready").data("{}"),
        }
    }

    fn for_results(results: &[ExecutionResult]) -> impl Iterator<Item = AgentEvent> + '_ {
        results.iter().enumerate().map(|(i, r)| AgentEvent::ActionDone {
            number: i + 1,
            success: r.success,
            message: r.message.clone(),
        })
    }
}

pub struct AppState {
    pub bridge: Bridge<ChannelTransport>,
    pub event_tx: broadcast::Sender<AgentEvent>,
}

impl AppState {
    fn emit(&self, event: AgentEvent) {
        // No subscribers just means no page is open.
        let _ = self.event_tx.send(event);
    }

    /// Forwards a request to the execution side, turning transport failures into a 503.
    async fn forward(&self, envelope: Envelope) -> Result<Envelope, Response> {
        match self.bridge.request(envelope).await {
            Ok(reply) if reply.kind == MessageType::Error => {
                let message = reply.error.unwrap_or_else(|| "request refused".into());
                self.emit(AgentEvent::Failed {
                    message: message.clone(),
                });
                Err((StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response())
            }
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!(error = %e, "execution side did not answer");
                let message = e.to_string();
                self.emit(AgentEvent::Failed {
                    message: message.clone(),
                });
                Err((
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({
                        "speech": "Sorry, I lost the connection to the store page.",
                        "error": message,
                    })),
                )
                    .into_response())
            }
        }
    }
}

#[derive(Deserialize)]
struct CommandPayload {
    command: String,
}

#[derive(Deserialize)]
struct ActionPayload {
    action: Value,
}

/// Serves the capture page on the first free port from `port` upward.
pub async fn start_server(
    port: u16,
    bridge: Bridge<ChannelTransport>,
) -> Result<broadcast::Sender<AgentEvent>> {
    let (event_tx, _) = broadcast::channel::<AgentEvent>(64);
    let state = Arc::new(AppState {
        bridge,
        event_tx: event_tx.clone(),
    });

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/command", post(command_handler))
        .route("/action", post(action_handler))
        .route("/context", get(context_handler))
        .route("/events", get(sse_handler))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .with_state(state);

    let mut bound = None;
    for candidate in port..port.saturating_add(10) {
        match tokio::net::TcpListener::bind(("127.0.0.1", candidate)).await {
            Ok(listener) => {
                bound = Some((listener, candidate));
                break;
            }
            Err(e) => warn!(port = candidate, error = %e, "port busy"),
        }
    }
    let (listener, port) = bound.ok_or_else(|| {
        anyhow!(
            "could not bind any port {port}-{}; is another agent running?",
            port.saturating_add(9)
        )
    })?;

    info!("voice UI at http://localhost:{port}");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "web server stopped");
        }
    });

    Ok(event_tx)
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn command_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CommandPayload>,
) -> Response {
    info!(command = payload.command.as_str(), "command captured");
    state.emit(AgentEvent::Working {
        command: payload.command.clone(),
    });

    let reply = match state.forward(Envelope::execute_command(payload.command)).await {
        Ok(reply) => reply,
        Err(response) => {
            state.emit(AgentEvent::Ready);
            return response;
        }
    };

    let results = reply.results.unwrap_or_default();
    let speech = reply.speech.unwrap_or_default();
    for event in AgentEvent::for_results(&results) {
        state.emit(event);
    }
    state.emit(AgentEvent::Speech {
        text: speech.clone(),
    });
    state.emit(AgentEvent::Ready);
    Json(json!({ "speech": speech, "results": results })).into_response()
}

async fn action_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ActionPayload>,
) -> Response {
    match state.forward(Envelope::execute_raw(payload.action)).await {
        Ok(reply) => {
            let results = reply.results.unwrap_or_default();
            for event in AgentEvent::for_results(&results) {
                state.emit(event);
            }
            Json(json!({ "results": results })).into_response()
        }
        Err(response) => response,
    }
}

async fn context_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.forward(Envelope::get_context()).await {
        Ok(reply) => Json(json!({ "context": reply.context })).into_response(),
        Err(response) => response,
    }
}

async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result: Result<AgentEvent, _>| match result {
        Ok(event) => Some(Ok::<_, Infallible>(event.to_sse_event())),
        Err(_) => None,
    });
    Sse::new(stream)
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Voice Cart</title>
<style>
  * { margin: 0; padding: 0; box-sizing: border-box; }
  body {
    background: #0a0a0f;
    color: #e0e0e0;
    font-family: 'Segoe UI', system-ui, -apple-system, sans-serif;
    height: 100vh;
    display: flex;
    flex-direction: column;
  }
  header {
    padding: 24px 32px;
    border-bottom: 1px solid #1a1a2e;
    display: flex;
    align-items: center;
    gap: 12px;
  }
  header h1 { font-size: 20px; font-weight: 600; color: #fff; }
  header .dot {
    width: 8px; height: 8px;
    border-radius: 50%;
    background: #22c55e;
    animation: pulse 2s infinite;
  }
  header .dot.busy { background: #f59e0b; }
  header .dot.listening { background: #ef4444; }
  @keyframes pulse { 0%, 100% { opacity: 1; } 50% { opacity: 0.4; } }
  .main {
    flex: 1;
    display: flex;
    flex-direction: column;
    max-width: 800px;
    width: 100%;
    margin: 0 auto;
    padding: 24px 32px;
    gap: 16px;
    overflow: hidden;
  }
  #log {
    flex: 1;
    overflow-y: auto;
    display: flex;
    flex-direction: column;
    gap: 8px;
    padding-right: 8px;
  }
  .entry {
    padding: 10px 14px;
    border-radius: 8px;
    font-size: 14px;
    line-height: 1.5;
    animation: fadeIn 0.2s ease;
  }
  @keyframes fadeIn { from { opacity: 0; transform: translateY(4px); } to { opacity: 1; } }
  .entry.user { background: #1a1a2e; border-left: 3px solid #6366f1; }
  .entry.action {
    background: #111118;
    border-left: 3px solid #3b82f6;
    font-family: 'Cascadia Code', 'Fira Code', monospace;
    font-size: 13px;
  }
  .entry.action .num { color: #6366f1; font-weight: 700; margin-right: 8px; }
  .entry.error { background: #1a0a0a; border-left: 3px solid #ef4444; color: #fca5a5; }
  .entry.speech { background: #0a1a0a; border-left: 3px solid #22c55e; color: #86efac; }
  .entry.note { background: #111118; border-left: 3px solid #f59e0b; color: #fcd34d; }
  .input-area { display: flex; gap: 8px; }
  #cmd {
    flex: 1;
    background: #111118;
    border: 1px solid #222;
    border-radius: 8px;
    padding: 12px 16px;
    color: #fff;
    font-size: 16px;
    outline: none;
  }
  #cmd:focus { border-color: #6366f1; }
  #cmd:disabled { opacity: 0.5; }
  button {
    background: #6366f1;
    color: #fff;
    border: none;
    border-radius: 8px;
    padding: 12px 20px;
    font-size: 15px;
    font-weight: 600;
    cursor: pointer;
  }
  button:hover { background: #4f46e5; }
  button:disabled { background: #333; cursor: not-allowed; }
  #mic.on { background: #ef4444; }
</style>
</head>
<body>
  <header>
    <div class="dot" id="status-dot"></div>
    <h1>Voice Cart</h1>
  </header>
  <div class="main">
    <div id="log"></div>
    <div class="input-area">
      <button id="mic" title="Hold a conversation with the store">Mic</button>
      <input type="text" id="cmd" placeholder="Say or type what you want..." autofocus />
      <button id="send">Send</button>
    </div>
  </div>
<script>
  const log = document.getElementById('log');
  const cmd = document.getElementById('cmd');
  const sendBtn = document.getElementById('send');
  const mic = document.getElementById('mic');
  const dot = document.getElementById('status-dot');
  let busy = false;

  const esc = s => String(s).replace(/&/g, '&amp;').replace(/</g, '&lt;');

  function addEntry(cls, html) {
    const div = document.createElement('div');
    div.className = 'entry ' + cls;
    div.innerHTML = html;
    log.appendChild(div);
    log.scrollTop = log.scrollHeight;
  }

  function setBusy(b) {
    busy = b;
    cmd.disabled = b;
    sendBtn.disabled = b;
    dot.className = b ? 'dot busy' : 'dot';
    if (!b) cmd.focus();
  }

  function speak(text) {
    if (!text || !('speechSynthesis' in window)) return;
    window.speechSynthesis.cancel();
    window.speechSynthesis.speak(new SpeechSynthesisUtterance(text));
  }

  async function send(text) {
    text = (text || '').trim();
    if (!text || busy) return;
    addEntry('user', '<strong>You:</strong> ' + esc(text));
    setBusy(true);
    try {
      const res = await fetch('/command', {
        method: 'POST',
        headers: {'Content-Type': 'application/json'},
        body: JSON.stringify({command: text}),
      });
      const body = await res.json();
      if (!res.ok && body.speech) speak(body.speech);
    } catch (e) {
      addEntry('error', 'Could not reach the agent: ' + esc(e));
      setBusy(false);
    }
  }

  sendBtn.addEventListener('click', () => { send(cmd.value); cmd.value = ''; });
  cmd.addEventListener('keydown', e => {
    if (e.key === 'Enter') { send(cmd.value); cmd.value = ''; }
  });

  const Recognition = window.SpeechRecognition || window.webkitSpeechRecognition;
  if (!Recognition) {
    mic.disabled = true;
    mic.title = 'Speech recognition is not supported in this browser. Type instead.';
    addEntry('note', 'Voice input is not available in this browser. Typed commands still work.');
  } else {
    const rec = new Recognition();
    rec.lang = navigator.language || 'en-US';
    rec.interimResults = false;
    rec.maxAlternatives = 1;
    let listening = false;

    rec.onresult = e => {
      const transcript = e.results[0][0].transcript;
      send(transcript);
    };
    rec.onerror = e => {
      if (e.error === 'not-allowed') {
        addEntry('error', 'Microphone permission was denied.');
      } else if (e.error !== 'no-speech' && e.error !== 'aborted') {
        addEntry('error', 'Speech recognition error: ' + esc(e.error));
      }
    };
    rec.onend = () => {
      listening = false;
      mic.className = '';
      if (!busy) dot.className = 'dot';
    };

    mic.addEventListener('click', () => {
      if (busy) return;
      if (listening) { rec.stop(); return; }
      window.speechSynthesis && window.speechSynthesis.cancel();
      listening = true;
      mic.className = 'on';
      dot.className = 'dot listening';
      rec.start();
    });
  }

  const es = new EventSource('/events');

  es.addEventListener('working', () => {
    addEntry('note', 'Working on it...');
  });

  es.addEventListener('action', e => {
    const d = JSON.parse(e.data);
    addEntry(d.success ? 'action' : 'error',
      '<span class="num">' + d.number + '</span>' + esc(d.message));
  });

  es.addEventListener('speech', e => {
    const d = JSON.parse(e.data);
    if (!d.text) return;
    addEntry('speech', esc(d.text));
    speak(d.text);
  });

  es.addEventListener('failed', e => {
    const d = JSON.parse(e.data);
    addEntry('error', '<strong>Failed:</strong> ' + esc(d.message));
  });

  es.addEventListener('ready', () => setBusy(false));

  addEntry('speech', 'Ready. Press Mic or type a command to start shopping.');
</script>
</body>
</html>
"##;
