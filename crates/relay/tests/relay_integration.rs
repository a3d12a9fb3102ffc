//! Integrationstests: echter axum-Server auf 127.0.0.1:0, Clients via tokio-tungstenite

use std::net::SocketAddr;
use std::time::Duration;

use earshot_core::types::CallId;
use earshot_observability::EarshotMetriken;
use earshot_protocol::media::{medien_nachricht, start_nachricht};
use earshot_relay::{
    RelayDispatcher, RelayOptionen, RelayServer, RollenKlassifizierer, SessionRegistry,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::USER_AGENT;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const PRODUZENT_AGENT: &str = "TwilioProxy/1.1";
const WARTEZEIT: Duration = Duration::from_secs(2);

struct TestRelay {
    addr: SocketAddr,
    dispatcher: RelayDispatcher,
    _shutdown: watch::Sender<bool>,
}

async fn relay_starten() -> TestRelay {
    let dispatcher = RelayDispatcher::neu(
        SessionRegistry::default(),
        RollenKlassifizierer::default(),
        EarshotMetriken::neu().unwrap(),
    );
    let server = RelayServer::neu(dispatcher.clone(), RelayOptionen::default());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = watch::channel(false);
    tokio::spawn(server.starten(listener, rx));

    TestRelay {
        addr,
        dispatcher,
        _shutdown: tx,
    }
}

async fn hoerer_verbinden(addr: SocketAddr, call_sid: &str) -> Client {
    let url = format!("ws://{addr}/?callSid={call_sid}");
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn produzent_verbinden(addr: SocketAddr, call_sid: Option<&str>) -> Result<Client, WsError> {
    let url = match call_sid {
        Some(sid) => format!("ws://{addr}/?callSid={sid}"),
        None => format!("ws://{addr}/"),
    };
    let mut anfrage = url.into_client_request()?;
    anfrage
        .headers_mut()
        .insert(USER_AGENT, PRODUZENT_AGENT.parse().unwrap());
    let (ws, _) = connect_async(anfrage).await?;
    Ok(ws)
}

/// Naechste Binaernachricht, Pings und Pongs werden uebersprungen
async fn naechster_frame(ws: &mut Client) -> Vec<u8> {
    loop {
        let nachricht = tokio::time::timeout(WARTEZEIT, ws.next())
            .await
            .expect("Timeout beim Warten auf Frame")
            .expect("Stream beendet")
            .expect("Transportfehler");
        match nachricht {
            Message::Binary(daten) => return daten,
            Message::Ping(_) | Message::Pong(_) => continue,
            andere => panic!("Binaernachricht erwartet, war {andere:?}"),
        }
    }
}

async fn kein_frame(ws: &mut Client) {
    let ergebnis = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(ergebnis.is_err(), "Unerwartete Nachricht: {ergebnis:?}");
}

async fn warte_bis(mut bedingung: impl FnMut() -> bool) {
    let start = tokio::time::Instant::now();
    while !bedingung() {
        assert!(start.elapsed() < WARTEZEIT, "Bedingung nicht erreicht");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn call(id: &str) -> CallId {
    CallId::neu(id).unwrap()
}

#[tokio::test]
async fn produzent_frame_erreicht_hoerer() {
    let relay = relay_starten().await;
    let mut hoerer = hoerer_verbinden(relay.addr, "CA123").await;
    let mut produzent = produzent_verbinden(relay.addr, Some("CA123")).await.unwrap();

    produzent
        .send(Message::Text(medien_nachricht("MZ1", &[1, 2, 3, 4])))
        .await
        .unwrap();

    assert_eq!(naechster_frame(&mut hoerer).await, vec![1, 2, 3, 4]);
    kein_frame(&mut hoerer).await;
}

#[tokio::test]
async fn reihenfolge_bleibt_erhalten() {
    let relay = relay_starten().await;
    let mut hoerer = hoerer_verbinden(relay.addr, "CA1").await;
    let mut produzent = produzent_verbinden(relay.addr, Some("CA1")).await.unwrap();

    for i in 0u8..20 {
        produzent
            .send(Message::Text(medien_nachricht("MZ", &[i, i, i])))
            .await
            .unwrap();
    }
    for i in 0u8..20 {
        assert_eq!(naechster_frame(&mut hoerer).await, vec![i, i, i]);
    }
}

#[tokio::test]
async fn zwei_hoerer_unabhaengig() {
    let relay = relay_starten().await;
    let mut a = hoerer_verbinden(relay.addr, "CA2").await;
    let mut b = hoerer_verbinden(relay.addr, "CA2").await;
    let mut produzent = produzent_verbinden(relay.addr, Some("CA2")).await.unwrap();

    produzent
        .send(Message::Text(medien_nachricht("MZ", b"eins")))
        .await
        .unwrap();
    assert_eq!(naechster_frame(&mut a).await, b"eins".to_vec());
    assert_eq!(naechster_frame(&mut b).await, b"eins".to_vec());

    // Einer geht, der andere hoert weiter
    a.close(None).await.unwrap();
    let registry = relay.dispatcher.registry().clone();
    warte_bis(|| registry.hoerer_anzahl(&call("CA2")) == 1).await;

    produzent
        .send(Message::Text(medien_nachricht("MZ", b"zwei")))
        .await
        .unwrap();
    assert_eq!(naechster_frame(&mut b).await, b"zwei".to_vec());
}

#[tokio::test]
async fn hoerer_ohne_produzent_und_abbau() {
    let relay = relay_starten().await;
    let mut hoerer = hoerer_verbinden(relay.addr, "CA999").await;
    assert!(relay.dispatcher.registry().enthaelt(&call("CA999")));
    kein_frame(&mut hoerer).await;

    hoerer.close(None).await.unwrap();
    let registry = relay.dispatcher.registry().clone();
    warte_bis(|| !registry.enthaelt(&call("CA999"))).await;
    assert_eq!(registry.sitzung_anzahl(), 0);
}

#[tokio::test]
async fn spaeter_hoerer_bekommt_keine_alten_frames() {
    let relay = relay_starten().await;
    let mut produzent = produzent_verbinden(relay.addr, Some("CA5")).await.unwrap();
    produzent
        .send(Message::Text(medien_nachricht("MZ", b"alt")))
        .await
        .unwrap();

    let metriken = relay.dispatcher.metriken().clone();
    warte_bis(|| metriken.frames_received_total.get() == 1).await;

    let mut hoerer = hoerer_verbinden(relay.addr, "CA5").await;
    produzent
        .send(Message::Text(medien_nachricht("MZ", b"neu")))
        .await
        .unwrap();
    assert_eq!(naechster_frame(&mut hoerer).await, b"neu".to_vec());
}

#[tokio::test]
async fn ungueltige_umschlaege_trennen_nicht() {
    let relay = relay_starten().await;
    let mut hoerer = hoerer_verbinden(relay.addr, "CA6").await;
    let mut produzent = produzent_verbinden(relay.addr, Some("CA6")).await.unwrap();

    for text in ["{kaputt", r#"{"event":"media","media":{"payload":"@@@"}}"#, r#"{"event":"mark"}"#] {
        produzent.send(Message::Text(text.to_string())).await.unwrap();
    }
    produzent
        .send(Message::Text(medien_nachricht("MZ", b"ok")))
        .await
        .unwrap();

    assert_eq!(naechster_frame(&mut hoerer).await, b"ok".to_vec());
}

#[tokio::test]
async fn produzent_ohne_call_sid_bindet_ueber_start() {
    let relay = relay_starten().await;
    let mut hoerer = hoerer_verbinden(relay.addr, "CA7").await;
    let mut produzent = produzent_verbinden(relay.addr, None).await.unwrap();

    produzent
        .send(Message::Text(start_nachricht("CA7", "MZ7")))
        .await
        .unwrap();
    produzent
        .send(Message::Text(medien_nachricht("MZ7", b"gebunden")))
        .await
        .unwrap();

    assert_eq!(naechster_frame(&mut hoerer).await, b"gebunden".to_vec());
    assert!(relay.dispatcher.registry().hat_produzent(&call("CA7")));
}

#[tokio::test]
async fn zweiter_produzent_bekommt_409() {
    let relay = relay_starten().await;
    let _erster = produzent_verbinden(relay.addr, Some("CA8")).await.unwrap();

    match produzent_verbinden(relay.addr, Some("CA8")).await {
        Err(WsError::Http(antwort)) => assert_eq!(antwort.status().as_u16(), 409),
        andere => panic!("HTTP 409 erwartet, war {:?}", andere.map(|_| ())),
    }
}

#[tokio::test]
async fn hoerer_ohne_call_sid_bekommt_400() {
    let relay = relay_starten().await;
    match connect_async(format!("ws://{}/", relay.addr)).await {
        Err(WsError::Http(antwort)) => assert_eq!(antwort.status().as_u16(), 400),
        andere => panic!("HTTP 400 erwartet, war {:?}", andere.map(|_| ())),
    }
}

#[tokio::test]
async fn produzent_geht_hoerer_bleibt_verbunden() {
    let relay = relay_starten().await;
    let mut hoerer = hoerer_verbinden(relay.addr, "CA9").await;
    let mut produzent = produzent_verbinden(relay.addr, Some("CA9")).await.unwrap();

    produzent.close(None).await.unwrap();
    let registry = relay.dispatcher.registry().clone();
    warte_bis(|| !registry.hat_produzent(&call("CA9"))).await;
    assert!(registry.enthaelt(&call("CA9")));
    kein_frame(&mut hoerer).await;

    // Neuer Produzent fuer denselben Call erreicht den alten Hoerer
    let mut neu = produzent_verbinden(relay.addr, Some("CA9")).await.unwrap();
    neu.send(Message::Text(medien_nachricht("MZ", b"wieder")))
        .await
        .unwrap();
    assert_eq!(naechster_frame(&mut hoerer).await, b"wieder".to_vec());
}
