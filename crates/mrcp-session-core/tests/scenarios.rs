//! End-to-end scenario tests (spec §8 "S1-S6") plus the cross-cutting
//! ordering properties 8-10, driven against the real [`mrcp_media_core`]
//! engine and the in-memory collaborators in [`common`].

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{pcma_16000, pcma_8000, pcmu_8000, EngineSpec, FakeChannelFactory, FakeFrontend, FrontendEvent};
use mrcp_media_core::engine::MediaEngine;
use mrcp_media_core::factory::ContextFactory;
use mrcp_media_core::StreamMode;
use mrcp_session_core::{
    AnswerStatus, AudioMediaDescriptor, ControlMediaDescriptor, ControlMessage, EngineConfig,
    MediaEngineHandle, MrcpVersion, OfferDescriptor, Profile, SessionOrchestrator, SignalingMessage,
};
use tokio::sync::mpsc;

fn build_profile() -> Profile {
    Profile::new()
        .with_capacity(5)
        .with_resource("speechrecog", EngineConfig { resource_engine_id: "speechrecog".to_string() })
        .with_resource("speechsynth", EngineConfig { resource_engine_id: "speechsynth".to_string() })
}

fn build_orchestrator(
    channel_factory: FakeChannelFactory,
    profile: Profile,
) -> (Arc<SessionOrchestrator>, Arc<ContextFactory>, mpsc::UnboundedReceiver<FrontendEvent>) {
    let factory = Arc::new(ContextFactory::new());
    let media_engine: Arc<dyn MediaEngineHandle> = Arc::new(MediaEngine::new(factory.clone()));
    let (frontend, rx) = FakeFrontend::new();
    let orchestrator =
        SessionOrchestrator::new(media_engine, frontend, Arc::new(channel_factory), Arc::new(profile));
    (orchestrator, factory, rx)
}

async fn recv_answer(rx: &mut mpsc::UnboundedReceiver<FrontendEvent>) -> mrcp_session_core::AnswerDescriptor {
    match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
        Ok(Some(FrontendEvent::Answer(answer))) => answer,
        other => panic!("expected an answer, got {other:?}"),
    }
}

fn v2_offer(control: Vec<ControlMediaDescriptor>, audio: Vec<AudioMediaDescriptor>) -> OfferDescriptor {
    OfferDescriptor { resource_name: None, resource_state: None, status: None, control, audio, video: Vec::new() }
}

fn audio_line(id: usize, mid: u32, mode: StreamMode, ip: &str, port: u16) -> AudioMediaDescriptor {
    AudioMediaDescriptor {
        id,
        mid: Some(mid),
        mode,
        codec_name: Some("PCMU".to_string()),
        sampling_rate: Some(8000),
        ip: Some(ip.to_string()),
        ext_ip: None,
        port,
    }
}

/// S1 — single-resource MRCPv2 offer, happy path.
#[tokio::test]
async fn s1_single_resource_happy_path() {
    let channel_factory = FakeChannelFactory::new(pcmu_8000())
        .with_engine("speechrecog", EngineSpec { codec: pcmu_8000(), has_vtable: false });
    let (orchestrator, factory, mut rx) = build_orchestrator(channel_factory, build_profile());

    let id = orchestrator.start_session().await;
    let offer = v2_offer(
        vec![ControlMediaDescriptor { id: 0, resource_name: Some("speechrecog".to_string()), cmid: Some(1), port: 0 }],
        vec![audio_line(0, 1, StreamMode::SEND_RECEIVE, "198.51.100.5", 40000)],
    );
    orchestrator.dispatch(&id, SignalingMessage::Offer { descriptor: offer }).unwrap();

    let answer = recv_answer(&mut rx).await;
    assert_eq!(answer.status, AnswerStatus::Ok);
    let control = answer.control[0].as_ref().expect("control answer");
    assert_eq!(control.resource_name.as_deref(), Some("speechrecog"));
    let audio = answer.audio[0].as_ref().expect("audio answer");
    assert_eq!(audio.ip.as_deref(), Some("203.0.113.10"));

    let session = orchestrator.table().get(&id).unwrap();
    let guard = session.lock().await;
    assert_eq!(guard.channels.len(), 1);
    assert!(guard.channels[0].engine_termination.is_some());
    assert_eq!(guard.termination_slots.len(), 1);
    assert!(guard.is_quiesced());
    let context = guard.context;
    drop(guard);

    let topology_len = factory.with_context(context, |c| c.topology_len()).unwrap();
    assert_eq!(topology_len, 2, "both directions between rtp and engine termination should bridge");
}

/// S2 — unknown resource.
#[tokio::test]
async fn s2_unknown_resource() {
    let channel_factory = FakeChannelFactory::new(pcmu_8000());
    let (orchestrator, _factory, mut rx) = build_orchestrator(channel_factory, build_profile());

    let id = orchestrator.start_session().await;
    let offer = v2_offer(
        vec![ControlMediaDescriptor { id: 0, resource_name: Some("nonesuch".to_string()), cmid: Some(1), port: 0 }],
        vec![audio_line(0, 1, StreamMode::SEND_RECEIVE, "198.51.100.5", 40000)],
    );
    orchestrator.dispatch(&id, SignalingMessage::Offer { descriptor: offer }).unwrap();

    let answer = recv_answer(&mut rx).await;
    assert_eq!(answer.status, AnswerStatus::NoSuchResource);
    assert!(answer.control[0].is_none());

    let session = orchestrator.table().get(&id).unwrap();
    let guard = session.lock().await;
    assert!(guard.channels[0].engine_channel.is_none());
    drop(guard);

    // The session must still exist and accept a subsequent TERMINATE.
    orchestrator.dispatch(&id, SignalingMessage::Terminate).unwrap();
    match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
        Ok(Some(FrontendEvent::TerminateResponse)) => {}
        other => panic!("expected terminate response, got {other:?}"),
    }
    assert!(!orchestrator.table().contains(&id));
}

/// S3 — two resources grouped on one RTP stream.
#[tokio::test]
async fn s3_two_resources_one_rtp_stream() {
    let channel_factory = FakeChannelFactory::new(pcmu_8000())
        .with_engine("speechrecog", EngineSpec { codec: pcmu_8000(), has_vtable: false })
        .with_engine("speechsynth", EngineSpec { codec: pcmu_8000(), has_vtable: false });
    let (orchestrator, factory, mut rx) = build_orchestrator(channel_factory, build_profile());

    let id = orchestrator.start_session().await;
    let offer = v2_offer(
        vec![
            ControlMediaDescriptor { id: 0, resource_name: Some("speechrecog".to_string()), cmid: Some(1), port: 0 },
            ControlMediaDescriptor { id: 1, resource_name: Some("speechsynth".to_string()), cmid: Some(1), port: 0 },
        ],
        vec![audio_line(0, 1, StreamMode::SEND_RECEIVE, "198.51.100.5", 40000)],
    );
    orchestrator.dispatch(&id, SignalingMessage::Offer { descriptor: offer }).unwrap();

    let answer = recv_answer(&mut rx).await;
    assert_eq!(answer.status, AnswerStatus::Ok);
    assert!(answer.control[0].is_some());
    assert!(answer.control[1].is_some());
    assert!(answer.audio[0].is_some());

    let session = orchestrator.table().get(&id).unwrap();
    let guard = session.lock().await;
    assert_eq!(guard.channels.len(), 2);
    assert_eq!(guard.termination_slots.len(), 1);
    assert_eq!(guard.termination_slots[0].channels.len(), 2);
    let context = guard.context;
    drop(guard);

    let topology_len = factory.with_context(context, |c| c.topology_len()).unwrap();
    assert_eq!(topology_len, 4, "both engine terminations bridge with the shared rtp termination in both directions");
}

/// S4 — OFFER then immediate TERMINATE while the OFFER is not yet answered.
#[tokio::test]
async fn s4_offer_then_immediate_terminate() {
    let channel_factory = FakeChannelFactory::new(pcmu_8000())
        .with_engine("speechrecog", EngineSpec { codec: pcmu_8000(), has_vtable: false });
    let (orchestrator, _factory, mut rx) = build_orchestrator(channel_factory, build_profile());

    let id = orchestrator.start_session().await;
    let offer = v2_offer(
        vec![ControlMediaDescriptor { id: 0, resource_name: Some("speechrecog".to_string()), cmid: Some(1), port: 0 }],
        vec![audio_line(0, 1, StreamMode::SEND_RECEIVE, "198.51.100.5", 40000)],
    );
    orchestrator.dispatch(&id, SignalingMessage::Offer { descriptor: offer }).unwrap();
    orchestrator.dispatch(&id, SignalingMessage::Terminate).unwrap();

    // The OFFER's answer must arrive before the TERMINATE response (spec §8
    // property 10), even though both were queued before either was handled.
    match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
        Ok(Some(FrontendEvent::Answer(answer))) => assert_eq!(answer.status, AnswerStatus::Ok),
        other => panic!("expected answer first, got {other:?}"),
    }
    match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
        Ok(Some(FrontendEvent::TerminateResponse)) => {}
        other => panic!("expected terminate response second, got {other:?}"),
    }
    assert!(!orchestrator.table().contains(&id));
}

/// S5 — overlapping CONTROL requests.
#[tokio::test]
async fn s5_overlapping_control_requests() {
    let channel_factory = FakeChannelFactory::new(pcmu_8000())
        .with_engine("speechrecog", EngineSpec { codec: pcmu_8000(), has_vtable: false });
    let log = channel_factory.log.clone();
    let control_channels = channel_factory.control_channels.clone();
    let (orchestrator, _factory, mut rx) = build_orchestrator(channel_factory, build_profile());

    let id = orchestrator.start_session().await;
    let offer = v2_offer(
        vec![ControlMediaDescriptor { id: 0, resource_name: Some("speechrecog".to_string()), cmid: Some(1), port: 0 }],
        vec![audio_line(0, 1, StreamMode::SEND_RECEIVE, "198.51.100.5", 40000)],
    );
    orchestrator.dispatch(&id, SignalingMessage::Offer { descriptor: offer }).unwrap();
    recv_answer(&mut rx).await;

    orchestrator
        .dispatch(&id, SignalingMessage::Control { channel: Some(0), message: ControlMessage { body: "recognize-1".into() } })
        .unwrap();
    orchestrator
        .dispatch(&id, SignalingMessage::Control { channel: Some(0), message: ControlMessage { body: "recognize-2".into() } })
        .unwrap();

    // MRCPv2 responses are delivered over the control channel, not the
    // frontend (spec §4.3: "MRCPv2 over control channel"), so wait on the
    // fake control channel's `sent` buffer instead of `rx`.
    let control_channel = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let found = control_channels.lock().unwrap().first().cloned();
            if let Some(cc) = found {
                return cc;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("control channel was never created");

    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let count = control_channel.sent.lock().await.len();
            if count == 2 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("expected two control responses on the control channel");

    let entries = log.lock().await.clone();
    assert_eq!(
        entries,
        vec![
            "start:\"recognize-1\"".to_string(),
            "end:\"recognize-1\"".to_string(),
            "start:\"recognize-2\"".to_string(),
            "end:\"recognize-2\"".to_string(),
        ],
        "the second request must not begin until the first has fully completed"
    );
}

/// S6 — sample-rate mismatch.
#[tokio::test]
async fn s6_sampling_rate_mismatch() {
    let channel_factory = FakeChannelFactory::new(pcma_16000())
        .with_engine("speechrecog", EngineSpec { codec: pcma_8000(), has_vtable: false });
    let (orchestrator, factory, mut rx) = build_orchestrator(channel_factory, build_profile());

    let id = orchestrator.start_session().await;
    let mut audio = audio_line(0, 1, StreamMode::SEND_RECEIVE, "198.51.100.5", 40000);
    audio.codec_name = Some("PCMA".to_string());
    audio.sampling_rate = Some(16000);
    let offer = v2_offer(
        vec![ControlMediaDescriptor { id: 0, resource_name: Some("speechrecog".to_string()), cmid: Some(1), port: 0 }],
        vec![audio],
    );
    orchestrator.dispatch(&id, SignalingMessage::Offer { descriptor: offer }).unwrap();

    let answer = recv_answer(&mut rx).await;
    assert_eq!(answer.status, AnswerStatus::Ok, "the offer still succeeds; only the media edge is silently dropped");

    let session = orchestrator.table().get(&id).unwrap();
    let guard = session.lock().await;
    let context = guard.context;
    drop(guard);

    let topology_len = factory.with_context(context, |c| c.topology_len()).unwrap();
    assert_eq!(topology_len, 0, "a sampling-rate mismatch must not produce a connection object");
}

/// Property 8 — `subrequest_count == 0` at every state-transition boundary.
/// Exercised implicitly by every scenario's `debug_assert!` in
/// `SessionOrchestrator::finish_answer`/`process_terminate`; this test
/// additionally checks it from the outside after a full offer/terminate
/// cycle.
#[tokio::test]
async fn property_8_quiesced_at_boundaries() {
    let channel_factory = FakeChannelFactory::new(pcmu_8000())
        .with_engine("speechrecog", EngineSpec { codec: pcmu_8000(), has_vtable: false });
    let (orchestrator, _factory, mut rx) = build_orchestrator(channel_factory, build_profile());

    let id = orchestrator.start_session().await;
    let offer = v2_offer(
        vec![ControlMediaDescriptor { id: 0, resource_name: Some("speechrecog".to_string()), cmid: Some(1), port: 0 }],
        vec![audio_line(0, 1, StreamMode::SEND_RECEIVE, "198.51.100.5", 40000)],
    );
    orchestrator.dispatch(&id, SignalingMessage::Offer { descriptor: offer }).unwrap();
    recv_answer(&mut rx).await;

    {
        let session = orchestrator.table().get(&id).unwrap();
        let guard = session.lock().await;
        assert!(guard.is_quiesced());
    }

    orchestrator.dispatch(&id, SignalingMessage::Terminate).unwrap();
    match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
        Ok(Some(FrontendEvent::TerminateResponse)) => {}
        other => panic!("expected terminate response, got {other:?}"),
    }
}

/// Engine-channel creation failure (spec §7 "UNACCEPTABLE_RESOURCE").
#[tokio::test]
async fn unacceptable_resource_on_engine_channel_creation_failure() {
    let channel_factory = FakeChannelFactory::new(pcmu_8000()).with_unacceptable("speechrecog");
    let (orchestrator, _factory, mut rx) = build_orchestrator(channel_factory, build_profile());

    let id = orchestrator.start_session().await;
    let offer = v2_offer(
        vec![ControlMediaDescriptor { id: 0, resource_name: Some("speechrecog".to_string()), cmid: Some(1), port: 0 }],
        Vec::new(),
    );
    orchestrator.dispatch(&id, SignalingMessage::Offer { descriptor: offer }).unwrap();

    let answer = recv_answer(&mut rx).await;
    assert_eq!(answer.status, AnswerStatus::UnacceptableResource);
}

/// Engine-channel open failure (spec §7 "UNAVAILABLE_RESOURCE").
#[tokio::test]
async fn unavailable_resource_on_engine_channel_open_failure() {
    let channel_factory = FakeChannelFactory::new(pcmu_8000())
        .with_engine("speechrecog", EngineSpec { codec: pcmu_8000(), has_vtable: false })
        .with_open_failure("speechrecog");
    let (orchestrator, _factory, mut rx) = build_orchestrator(channel_factory, build_profile());

    let id = orchestrator.start_session().await;
    let offer = v2_offer(
        vec![ControlMediaDescriptor { id: 0, resource_name: Some("speechrecog".to_string()), cmid: Some(1), port: 0 }],
        Vec::new(),
    );
    orchestrator.dispatch(&id, SignalingMessage::Offer { descriptor: offer }).unwrap();

    let answer = recv_answer(&mut rx).await;
    assert_eq!(answer.status, AnswerStatus::UnavailableResource);
}

/// MRCPv1: a single implicit resource, routed without a control channel.
#[tokio::test]
async fn mrcpv1_single_implicit_resource() {
    let channel_factory = FakeChannelFactory::new(pcmu_8000())
        .with_engine("speechrecog", EngineSpec { codec: pcmu_8000(), has_vtable: false });
    let (orchestrator, _factory, mut rx) = build_orchestrator(channel_factory, build_profile());

    let id = orchestrator.start_session().await;
    let offer = OfferDescriptor {
        resource_name: Some("speechrecog".to_string()),
        resource_state: None,
        status: None,
        control: Vec::new(),
        audio: vec![audio_line(0, 1, StreamMode::SEND_RECEIVE, "198.51.100.5", 40000)],
        video: Vec::new(),
    };
    orchestrator.dispatch(&id, SignalingMessage::Offer { descriptor: offer }).unwrap();

    let answer = recv_answer(&mut rx).await;
    assert_eq!(answer.status, AnswerStatus::Ok);
    assert!(answer.audio[0].is_some());

    let session = orchestrator.table().get(&id).unwrap();
    let guard = session.lock().await;
    assert_eq!(guard.version, Some(MrcpVersion::V1));
    assert!(guard.channels[0].control_channel.is_none());
}
