//! Integration-Tests fuer den Hub ueber echten TCP-Transport (Loopback-Codec)

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::codec::Framed;
use voxrelay_protocol::control::{SpeechRelayRequest, TextRelayRequest};
use voxrelay_protocol::{ErrorCode, FrameCodec, HubNachricht, HubPayload};
use voxrelay_signaling::{SignalingConfig, SignalingServer, SignalingState};
use voxrelay_speech::{audio_dekodieren, audio_kodieren, LoopbackCodec};

type Client = Framed<TcpStream, FrameCodec>;

struct TestServer {
    adresse: SocketAddr,
    state: Arc<SignalingState>,
    shutdown_tx: watch::Sender<bool>,
}

async fn server(config: SignalingConfig) -> TestServer {
    let state = SignalingState::neu(config, Arc::new(LoopbackCodec));
    let server = SignalingServer::binden(Arc::clone(&state), "127.0.0.1:0".parse().unwrap())
        .await
        .expect("Bind fehlgeschlagen");
    let adresse = server.lokale_adresse().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(server.starten(shutdown_rx));
    TestServer {
        adresse,
        state,
        shutdown_tx,
    }
}

async fn verbinden(server: &TestServer) -> Client {
    let stream = TcpStream::connect(server.adresse).await.unwrap();
    Framed::new(stream, FrameCodec::new())
}

/// Wartet bis die Bedingung gilt (Verbindungsauf- und -abbau laufen asynchron)
async fn warten_bis(mut bedingung: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !bedingung() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Bedingung nicht rechtzeitig erfuellt");
}

/// Naechste Nachricht ohne Keepalive-Pings
async fn empfangen(client: &mut Client) -> HubNachricht {
    loop {
        let nachricht = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Keine Nachricht innerhalb von 5s")
            .expect("Verbindung geschlossen")
            .expect("Frame-Fehler")
            .nachricht()
            .expect("Frame ungueltig");
        if !matches!(nachricht.payload, HubPayload::Ping(_)) {
            return nachricht;
        }
    }
}

fn senden_nachricht(request_id: u32, user: &str, message: &str) -> HubNachricht {
    HubNachricht::new(
        request_id,
        HubPayload::SendMessage(TextRelayRequest {
            user: user.into(),
            message: message.into(),
        }),
    )
}

#[tokio::test]
async fn text_wird_an_alle_verteilt_und_bestaetigt() {
    let server = server(SignalingConfig::default()).await;
    let mut alice = verbinden(&server).await;
    let mut bob = verbinden(&server).await;
    warten_bis(|| server.state.verbindungen() == 2).await;

    alice.send(senden_nachricht(1, "alice", "hi")).await.unwrap();

    for client in [&mut alice, &mut bob] {
        match empfangen(client).await.payload {
            HubPayload::ReceiveBroadcast(e) => {
                assert_eq!(e.user, "alice");
                assert_eq!(e.original_message, "hi");
                assert_eq!(audio_dekodieren(&e.message).unwrap(), b"hi");
            }
            anders => panic!("ReceiveBroadcast erwartet, erhalten: {anders:?}"),
        }
    }
    assert_eq!(empfangen(&mut alice).await, HubNachricht::ack(1));

    let registry = server.state.hub.registry();
    assert!(registry.verbindung_suchen("alice").is_some());
}

#[tokio::test]
async fn sprache_wird_als_text_verteilt() {
    let server = server(SignalingConfig::default()).await;
    let mut carol = verbinden(&server).await;

    carol
        .send(HubNachricht::new(
            5,
            HubPayload::SpeechToRelay(SpeechRelayRequest {
                user: "carol".into(),
                audio_base64: audio_kodieren("guten tag".as_bytes()),
                original_message: "good day".into(),
            }),
        ))
        .await
        .unwrap();

    match empfangen(&mut carol).await.payload {
        HubPayload::ReceiveBroadcast(e) => {
            assert_eq!(e.message, "guten tag");
            assert_eq!(e.original_message, "good day");
        }
        anders => panic!("ReceiveBroadcast erwartet, erhalten: {anders:?}"),
    }
    assert_eq!(empfangen(&mut carol).await, HubNachricht::ack(5));
}

#[tokio::test]
async fn ungueltige_eingabe_nur_an_absender() {
    let server = server(SignalingConfig::default()).await;
    let mut alice = verbinden(&server).await;
    let mut bob = verbinden(&server).await;
    warten_bis(|| server.state.verbindungen() == 2).await;

    alice.send(senden_nachricht(2, "", "hi")).await.unwrap();

    match empfangen(&mut alice).await.payload {
        HubPayload::Error(e) => assert_eq!(e.code, ErrorCode::InvalidRequest),
        anders => panic!("Error erwartet, erhalten: {anders:?}"),
    }

    // bob bekommt nichts ausser Keepalive
    let nichts = tokio::time::timeout(Duration::from_millis(200), empfangen(&mut bob)).await;
    assert!(nichts.is_err());
}

#[tokio::test]
async fn zu_grosse_umwandlung_trennt_niemanden() {
    let server = server(SignalingConfig {
        max_frame_bytes: 4096,
        ..SignalingConfig::default()
    })
    .await;
    let mut alice = verbinden(&server).await;
    let mut bob = verbinden(&server).await;
    warten_bis(|| server.state.verbindungen() == 2).await;

    // passt eingehend in einen Frame, als base64-Audio nicht mehr
    let lang = "a".repeat(3500);
    alice.send(senden_nachricht(1, "alice", &lang)).await.unwrap();

    match empfangen(&mut alice).await {
        HubNachricht {
            request_id: 1,
            payload: HubPayload::Error(e),
        } => assert_eq!(e.code, ErrorCode::PayloadTooLarge),
        anders => panic!("PayloadTooLarge erwartet, erhalten: {anders:?}"),
    }
    let nichts = tokio::time::timeout(Duration::from_millis(200), empfangen(&mut bob)).await;
    assert!(nichts.is_err());
    assert_eq!(server.state.verbindungen(), 2);
    assert!(server.state.hub.registry().verbindung_suchen("alice").is_none());

    bob.send(senden_nachricht(2, "bob", "hallo")).await.unwrap();
    for client in [&mut alice, &mut bob] {
        match empfangen(client).await.payload {
            HubPayload::ReceiveBroadcast(e) => assert_eq!(e.user, "bob"),
            anders => panic!("ReceiveBroadcast erwartet, erhalten: {anders:?}"),
        }
    }
}

#[tokio::test]
async fn schemafehler_trennt_nicht() {
    let server = server(SignalingConfig::default()).await;
    let mut alice = verbinden(&server).await;
    warten_bis(|| server.state.hub.online_anzahl() == 1).await;

    let json = br#"{"request_id":1,"payload":{"type":"send_message","message":"hi"}}"#;
    let stream = alice.get_mut();
    stream.write_all(&(json.len() as u32).to_be_bytes()).await.unwrap();
    stream.write_all(json).await.unwrap();

    match empfangen(&mut alice).await {
        HubNachricht {
            request_id: 1,
            payload: HubPayload::Error(e),
        } => assert_eq!(e.code, ErrorCode::InvalidRequest),
        anders => panic!("InvalidRequest erwartet, erhalten: {anders:?}"),
    }
    assert_eq!(server.state.hub.online_anzahl(), 1);

    // dieselbe Verbindung arbeitet weiter
    alice.send(senden_nachricht(2, "alice", "hi")).await.unwrap();
    assert!(matches!(
        empfangen(&mut alice).await.payload,
        HubPayload::ReceiveBroadcast(_)
    ));
    assert_eq!(empfangen(&mut alice).await, HubNachricht::ack(2));
}

#[tokio::test]
async fn trennung_entfernt_benutzer() {
    let server = server(SignalingConfig::default()).await;
    let mut alice = verbinden(&server).await;
    let mut bob = verbinden(&server).await;

    alice.send(senden_nachricht(1, "alice", "hi")).await.unwrap();
    let _ = empfangen(&mut alice).await;
    let _ = empfangen(&mut alice).await;
    let _ = empfangen(&mut bob).await;

    drop(alice);
    warten_bis(|| server.state.hub.registry().verbindung_suchen("alice").is_none()).await;
    warten_bis(|| server.state.verbindungen() == 1).await;

    bob.send(senden_nachricht(2, "bob", "noch da")).await.unwrap();
    match empfangen(&mut bob).await.payload {
        HubPayload::ReceiveBroadcast(e) => assert_eq!(e.user, "bob"),
        anders => panic!("ReceiveBroadcast erwartet, erhalten: {anders:?}"),
    }
    assert_eq!(server.state.hub.online_anzahl(), 1);
}

#[tokio::test]
async fn volle_server_lehnen_ab() {
    let server = server(SignalingConfig {
        max_clients: 1,
        ..SignalingConfig::default()
    })
    .await;
    let _erster = verbinden(&server).await;
    warten_bis(|| server.state.verbindungen() == 1).await;

    let mut zweiter = verbinden(&server).await;
    match empfangen(&mut zweiter).await.payload {
        HubPayload::Error(e) => assert_eq!(e.code, ErrorCode::ServerFull),
        anders => panic!("ServerFull erwartet, erhalten: {anders:?}"),
    }
    assert_eq!(server.state.verbindungen(), 1);
}

#[tokio::test]
async fn shutdown_trennt_clients() {
    let server = server(SignalingConfig::default()).await;
    let mut client = verbinden(&server).await;
    warten_bis(|| server.state.verbindungen() == 1).await;

    server.shutdown_tx.send(true).unwrap();

    match empfangen(&mut client).await.payload {
        HubPayload::Error(e) => assert_eq!(e.code, ErrorCode::InternalError),
        anders => panic!("Abschied erwartet, erhalten: {anders:?}"),
    }
    warten_bis(|| server.state.hub.online_anzahl() == 0).await;
}
