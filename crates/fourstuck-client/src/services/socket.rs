//! `web_sys::WebSocket` transport for the push channel.

use std::cell::RefCell;

use fourstuck_core::connection::TransportSink;
use fourstuck_core::{ConnectionError, Transport, TransportEvent};
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket};

struct WsHandlers {
    onopen: Closure<dyn FnMut(Event)>,
    onmessage: Closure<dyn FnMut(MessageEvent)>,
    onerror: Closure<dyn FnMut(Event)>,
    onclose: Closure<dyn FnMut(CloseEvent)>,
}

struct OpenSocket {
    ws: WebSocket,
    handlers: WsHandlers,
}

impl OpenSocket {
    fn detach(&self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onerror(None);
        self.ws.set_onclose(None);
    }
}

#[derive(Default)]
pub struct WebSocketTransport {
    socket: RefCell<Option<OpenSocket>>,
    // Handlers of replaced sockets. A socket may be replaced from inside one
    // of its own callbacks, so they are freed on the next open instead.
    retired: RefCell<Vec<WsHandlers>>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn shutdown_current(&self) {
        let Some(old) = self.socket.borrow_mut().take() else {
            return;
        };
        old.detach();
        if let Err(err) = old.ws.close() {
            tracing::debug!(?err, "closing websocket failed");
        }
        self.retired.borrow_mut().push(old.handlers);
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, url: &str, sink: TransportSink) -> Result<(), ConnectionError> {
        self.retired.borrow_mut().clear();
        self.shutdown_current();

        let ws =
            WebSocket::new(url).map_err(|err| ConnectionError::OpenFailed(format!("{err:?}")))?;

        let onopen = {
            let sink = sink.clone();
            Closure::wrap(Box::new(move |_event: Event| {
                sink(TransportEvent::Opened);
            }) as Box<dyn FnMut(Event)>)
        };
        let onmessage = {
            let sink = sink.clone();
            Closure::wrap(Box::new(move |event: MessageEvent| {
                match event.data().as_string() {
                    Some(text) => sink(TransportEvent::Message(text)),
                    None => tracing::debug!("non-text websocket frame ignored"),
                }
            }) as Box<dyn FnMut(MessageEvent)>)
        };
        let onerror = {
            let sink = sink.clone();
            // Socket errors are plain events that carry no description.
            Closure::wrap(Box::new(move |_event: Event| {
                sink(TransportEvent::Error("websocket error".to_string()));
            }) as Box<dyn FnMut(Event)>)
        };
        let onclose = Closure::wrap(Box::new(move |event: CloseEvent| {
            sink(TransportEvent::Closed {
                code: event.code(),
                reason: event.reason(),
            });
        }) as Box<dyn FnMut(CloseEvent)>);

        ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));

        *self.socket.borrow_mut() = Some(OpenSocket {
            ws,
            handlers: WsHandlers {
                onopen,
                onmessage,
                onerror,
                onclose,
            },
        });
        Ok(())
    }

    fn send(&self, text: &str) -> Result<(), ConnectionError> {
        let socket = self.socket.borrow();
        let Some(socket) = socket.as_ref() else {
            return Err(ConnectionError::NotConnected);
        };
        if socket.ws.ready_state() != WebSocket::OPEN {
            return Err(ConnectionError::NotConnected);
        }
        socket
            .ws
            .send_with_str(text)
            .map_err(|err| ConnectionError::Transport(format!("{err:?}")))
    }

    fn close(&self) {
        self.shutdown_current();
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use std::rc::Rc;

    use futures::StreamExt;
    use futures::channel::mpsc;
    use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

    use super::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    async fn test_refused_socket_reports_error_then_close() {
        let (tx, mut rx) = mpsc::unbounded();
        let transport = WebSocketTransport::new();
        let sink: TransportSink = Rc::new(move |event| {
            let _ = tx.unbounded_send(event);
        });
        transport.open("ws://127.0.0.1:1", sink).unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.next().await {
            let closed = matches!(event, TransportEvent::Closed { .. });
            events.push(event);
            if closed {
                break;
            }
        }

        let errors = events
            .iter()
            .filter(|e| matches!(e, TransportEvent::Error(_)))
            .count();
        assert_eq!(errors, 1);
        assert!(matches!(events.first(), Some(TransportEvent::Error(_))));
        assert!(matches!(events.last(), Some(TransportEvent::Closed { code: 1006, .. })));
        assert!(matches!(transport.send("{}"), Err(ConnectionError::NotConnected)));
    }
}
