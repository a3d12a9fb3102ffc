//! Verbindungs-Tasks – ein Task pro WebSocket
//!
//! Beide Tasks enden bei Close, Transportfehler oder Shutdown. Die
//! [`Registrierung`](crate::dispatcher::Registrierung) lebt im Task und
//! meldet die Verbindung beim Verlassen ab.

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};

use crate::dispatcher::{ProduzentKontext, Registrierung, RelayDispatcher};

/// Task eines Hoerers: Egress-Queue -> Binaernachrichten
pub async fn hoerer_verbindung(
    socket: WebSocket,
    registrierung: Registrierung,
    mut queue: mpsc::Receiver<Bytes>,
    mut shutdown: watch::Receiver<bool>,
) {
    let verbindung = registrierung.verbindung().clone();
    let (mut sender, mut eingang) = socket.split();

    loop {
        tokio::select! {
            frame = queue.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sender.send(Message::Binary(frame.to_vec())).await {
                        tracing::debug!(verbindung = %verbindung.id, fehler = %e, "Senden an Hoerer fehlgeschlagen");
                        break;
                    }
                }
                None => {
                    // Registry hat den Hoerer entfernt
                    tracing::debug!(verbindung = %verbindung.id, "Egress-Queue geschlossen");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },

            nachricht = eingang.next() => match nachricht {
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(verbindung = %verbindung.id, "Hoerer hat Verbindung geschlossen");
                    break;
                }
                Some(Ok(_)) => {
                    // Hoerer senden nichts Relevantes; Pings beantwortet der Transport
                }
                Some(Err(e)) => {
                    tracing::debug!(verbindung = %verbindung.id, fehler = %e, "Transportfehler beim Hoerer");
                    break;
                }
            },

            _ = shutdown.changed() => {
                tracing::debug!(verbindung = %verbindung.id, "Shutdown, Hoerer-Verbindung wird geschlossen");
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    drop(registrierung);
}

/// Task eines Produzenten: Textnachrichten -> Dispatcher
pub async fn produzent_verbindung(
    mut socket: WebSocket,
    dispatcher: RelayDispatcher,
    mut kontext: ProduzentKontext,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            nachricht = socket.recv() => match nachricht {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = dispatcher.produzent_nachricht(&mut kontext, &text) {
                        tracing::warn!(fehler = %e, "Produzenten-Verbindung wird geschlossen");
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
                Some(Ok(Message::Binary(daten))) => {
                    tracing::debug!(bytes = daten.len(), "Binaernachricht vom Produzenten ignoriert");
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(call_id = ?kontext.call_id().map(|c| c.as_str()), "Produzent hat Verbindung geschlossen");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(fehler = %e, "Transportfehler beim Produzenten");
                    break;
                }
            },

            _ = shutdown.changed() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }

    drop(kontext);
}
