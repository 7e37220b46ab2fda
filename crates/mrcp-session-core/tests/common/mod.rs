//! Shared in-memory collaborators for the scenario tests (spec §8 "S1-S6").
//! Stands in for the signaling transport, resource engines, and RTP
//! termination factory the orchestrator otherwise treats as out-of-scope
//! collaborators (spec §1).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use mrcp_media_core::engine::RtpEndpoint;
use mrcp_media_core::termination::{AudioStream, Codec, CodecDescriptor, StreamMode, Termination};
use mrcp_session_core::{
    AnswerDescriptor, ChannelFactory, ControlChannelHandle, ControlMessage, EngineChannelHandle,
    EngineMessage, EngineMessageKind, MethodStateMachine, ModifyOutcome, MrcpVersion, OpenOutcome,
    SignalingFrontend,
};
use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Clone)]
pub enum FrontendEvent {
    Answer(AnswerDescriptor),
    ControlResponse(ControlMessage),
    TerminateResponse,
}

/// Records every outbound notification so a test can `recv().await` them in
/// arrival order (spec §8 property 9).
pub struct FakeFrontend {
    tx: mpsc::UnboundedSender<FrontendEvent>,
}

impl FakeFrontend {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FrontendEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl SignalingFrontend for FakeFrontend {
    fn session_answer(&self, descriptor: AnswerDescriptor) {
        let _ = self.tx.send(FrontendEvent::Answer(descriptor));
    }

    fn session_control_response(&self, message: ControlMessage) {
        let _ = self.tx.send(FrontendEvent::ControlResponse(message));
    }

    fn session_terminate_response(&self) {
        let _ = self.tx.send(FrontendEvent::TerminateResponse);
    }
}

pub struct FakeControlChannel {
    pub sent: Mutex<Vec<ControlMessage>>,
}

impl FakeControlChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { sent: Mutex::new(Vec::new()) })
    }
}

#[async_trait]
impl ControlChannelHandle for FakeControlChannel {
    async fn modify(&self) -> ModifyOutcome {
        ModifyOutcome::Immediate
    }

    async fn remove(&self) {}

    async fn send_message(&self, message: ControlMessage) {
        self.sent.lock().await.push(message);
    }
}

pub struct FakeMethodStateMachine {
    pub deactivated: Mutex<bool>,
}

impl FakeMethodStateMachine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { deactivated: Mutex::new(false) })
    }
}

#[async_trait]
impl MethodStateMachine for FakeMethodStateMachine {
    async fn deactivate(&self) {
        *self.deactivated.lock().await = true;
    }
}

/// A resource engine's audio leg configuration: the codec/mode its owned
/// termination presents, so topology compilation can be driven deliberately
/// (matched, for S6, mismatched on sampling rate).
#[derive(Debug, Clone)]
pub struct EngineSpec {
    pub codec: CodecDescriptor,
    pub has_vtable: bool,
}

pub struct FakeEngineChannel {
    spec: EngineSpec,
    fail_open: bool,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EngineChannelHandle for FakeEngineChannel {
    async fn open(&self) -> OpenOutcome {
        if self.fail_open {
            return OpenOutcome { succeeded: false, termination: None };
        }
        let codec = Codec { descriptor: self.spec.codec.clone(), has_codec_vtable: self.spec.has_vtable };
        let stream = AudioStream::new(StreamMode::SEND_RECEIVE).with_codecs(codec.clone(), codec);
        OpenOutcome { succeeded: true, termination: Some(Termination::new(stream)) }
    }

    async fn close(&self) {}

    async fn process_request(&self, message: ControlMessage) -> Vec<EngineMessage> {
        let tag = message.body.to_string();
        self.log.lock().await.push(format!("start:{tag}"));
        let response = EngineMessage { kind: EngineMessageKind::Response, message };
        self.log.lock().await.push(format!("end:{tag}"));
        vec![response]
    }
}

/// Constructs per-channel collaborators for the scenario tests. Resources
/// are looked up by `resource_engine_id` (tests use the resource name
/// directly, since [`mrcp_session_core::Profile`] maps one to the other
/// one-for-one in these fixtures).
pub struct FakeChannelFactory {
    pub rtp_codec: CodecDescriptor,
    pub engines: HashMap<String, EngineSpec>,
    pub unacceptable: HashSet<String>,
    pub fail_open: HashSet<String>,
    pub log: Arc<Mutex<Vec<String>>>,
    /// Every MRCPv2 control channel created, in creation order -- lets a test
    /// inspect what was sent over it directly, since V2 responses are routed
    /// there and never through `SignalingFrontend` (orchestrator.rs
    /// `deliver_engine_message`).
    pub control_channels: Arc<std::sync::Mutex<Vec<Arc<FakeControlChannel>>>>,
    next_port: std::sync::atomic::AtomicU16,
}

impl FakeChannelFactory {
    pub fn new(rtp_codec: CodecDescriptor) -> Self {
        Self {
            rtp_codec,
            engines: HashMap::new(),
            unacceptable: HashSet::new(),
            fail_open: HashSet::new(),
            log: Arc::new(Mutex::new(Vec::new())),
            control_channels: Arc::new(std::sync::Mutex::new(Vec::new())),
            next_port: std::sync::atomic::AtomicU16::new(30000),
        }
    }

    pub fn with_engine(mut self, resource_engine_id: &str, spec: EngineSpec) -> Self {
        self.engines.insert(resource_engine_id.to_string(), spec);
        self
    }

    pub fn with_unacceptable(mut self, resource_engine_id: &str) -> Self {
        self.unacceptable.insert(resource_engine_id.to_string());
        self
    }

    pub fn with_open_failure(mut self, resource_engine_id: &str) -> Self {
        self.fail_open.insert(resource_engine_id.to_string());
        self
    }
}

impl ChannelFactory for FakeChannelFactory {
    fn create_engine_channel(&self, resource_engine_id: &str) -> Option<Arc<dyn EngineChannelHandle>> {
        if self.unacceptable.contains(resource_engine_id) {
            return None;
        }
        let spec = self
            .engines
            .get(resource_engine_id)
            .cloned()
            .unwrap_or_else(|| EngineSpec { codec: self.rtp_codec.clone(), has_vtable: false });
        Some(Arc::new(FakeEngineChannel {
            spec,
            fail_open: self.fail_open.contains(resource_engine_id),
            log: self.log.clone(),
        }))
    }

    fn create_control_channel(&self, version: MrcpVersion) -> Option<Arc<dyn ControlChannelHandle>> {
        match version {
            MrcpVersion::V2 => {
                let channel = FakeControlChannel::new();
                self.control_channels.lock().unwrap().push(channel.clone());
                Some(channel)
            }
            MrcpVersion::V1 => None,
        }
    }

    fn create_method_state_machine(&self, _resource_engine_id: &str) -> Arc<dyn MethodStateMachine> {
        FakeMethodStateMachine::new()
    }

    fn create_rtp_termination(&self) -> Termination {
        let codec = Codec { descriptor: self.rtp_codec.clone(), has_codec_vtable: false };
        let stream = AudioStream::new(StreamMode::SEND_RECEIVE).with_codecs(codec.clone(), codec);
        Termination::new(stream)
    }

    fn allocate_rtp_endpoint(&self) -> RtpEndpoint {
        let port = self.next_port.fetch_add(2, std::sync::atomic::Ordering::SeqCst);
        RtpEndpoint { ip: "203.0.113.10".to_string(), ext_ip: None, port }
    }
}

pub fn pcmu_8000() -> CodecDescriptor {
    CodecDescriptor { name: "PCMU".to_string(), sampling_rate: 8000, channels: 1 }
}

pub fn pcma_8000() -> CodecDescriptor {
    CodecDescriptor { name: "PCMA".to_string(), sampling_rate: 8000, channels: 1 }
}

pub fn pcma_16000() -> CodecDescriptor {
    CodecDescriptor { name: "PCMA".to_string(), sampling_rate: 16000, channels: 1 }
}
