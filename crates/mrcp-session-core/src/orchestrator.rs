//! The per-session state machine coordinator (spec §4.3). Drives Media
//! Engine batches and collaborator calls against one session at a time,
//! gating state transitions on `subrequest_count` reaching zero.
//!
//! Each session owns a dedicated task (spawned from [`start_session`])
//! reading [`SignalingMessage`]s off an `mpsc` channel; that task's loop is
//! what realizes the "exactly one signaling message active at a time, FIFO
//! otherwise" invariant (spec §3, §9) — there is no explicit queue field
//! anywhere in this module.

use std::sync::Arc;

use mrcp_media_core::engine::{MediaCommand, MediaResponse, RtpDescriptor, RtpEndpoint};
use mrcp_media_core::termination::{StreamMode, TerminationId};
use mrcp_media_core::CommandKind;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::channel::Channel;
use crate::collaborators::{ChannelFactory, MediaEngineHandle, ModifyOutcome};
use crate::errors::Result;
use crate::profile::Profile;
use crate::session::{Session, SessionState};
use crate::signaling::{SignalingFrontend, SignalingMessage};
use crate::table::{SessionHandle, SessionTable};
use crate::termination_slot::TerminationSlot;
use crate::types::{
    AnswerDescriptor, AnswerStatus, AudioMediaDescriptor, ControlMediaDescriptor, ControlMessage,
    EngineMessage, EngineMessageKind, MrcpVersion, OfferDescriptor, SessionId,
};

/// Coordinates every live session against its collaborators. One instance is
/// shared (via `Arc`) by a signaling front-end for the lifetime of the
/// process.
pub struct SessionOrchestrator {
    media_engine: Arc<dyn MediaEngineHandle>,
    frontend: Arc<dyn SignalingFrontend>,
    channel_factory: Arc<dyn ChannelFactory>,
    table: SessionTable,
    profile: Arc<Profile>,
}

impl SessionOrchestrator {
    pub fn new(
        media_engine: Arc<dyn MediaEngineHandle>,
        frontend: Arc<dyn SignalingFrontend>,
        channel_factory: Arc<dyn ChannelFactory>,
        profile: Arc<Profile>,
    ) -> Arc<Self> {
        Arc::new(Self {
            media_engine,
            frontend,
            channel_factory,
            table: SessionTable::new(),
            profile,
        })
    }

    /// Begins a new session: generates its id, creates its media context,
    /// and spawns the task that will drive every signaling message addressed
    /// to it (spec §4.3 step 1 "if this is the first offer, generate the
    /// session ID and create the media context"). The caller dispatches the
    /// triggering `OFFER` immediately afterwards via [`Self::dispatch`].
    pub async fn start_session(self: &Arc<Self>) -> SessionId {
        let id = self.table.generate_id().await;
        let context = self.media_engine.create_context(self.profile.media_context_capacity);
        let session = Session::new(id.clone(), self.profile.clone(), context);

        let (sender, mut receiver) = mpsc::unbounded_channel();
        self.table.insert(
            id.clone(),
            SessionHandle {
                session: Arc::new(Mutex::new(session)),
                sender,
            },
        );

        let session_lock = self.table.get(&id).expect("just inserted");
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                let mut guard = session_lock.lock().await;
                orchestrator.process_message(&mut guard, message).await;
            }
        });

        id
    }

    /// Queues a signaling message on its session's task (spec §3 "arriving
    /// messages push to a FIFO queue").
    pub fn dispatch(&self, id: &SessionId, message: SignalingMessage) -> Result<()> {
        self.table.dispatch(id, message)
    }

    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    async fn process_message(&self, session: &mut Session, message: SignalingMessage) {
        match message {
            SignalingMessage::Offer { descriptor } => self.process_offer(session, descriptor).await,
            SignalingMessage::Control { channel, message } => {
                self.process_control(session, channel, message).await
            }
            SignalingMessage::Terminate => self.process_terminate(session).await,
        }
    }

    // ---- Offer processing (spec §4.3 "Offer processing") ----

    async fn process_offer(&self, session: &mut Session, descriptor: OfferDescriptor) {
        session.enter_state(SessionState::Answering);

        // MRCPv1 packs one implicit resource straight onto the session;
        // MRCPv2 always carries its resources in the control array (spec §6
        // "Protocol versions").
        let version = if descriptor.control.is_empty() && descriptor.resource_name.is_some() {
            MrcpVersion::V1
        } else {
            MrcpVersion::V2
        };
        session.version = Some(version);

        let mut answer = AnswerDescriptor::from_offer(&descriptor);
        let mut audio_mode_overrides = vec![StreamMode::NONE; descriptor.audio.len()];

        session.pending_batch.add(MediaCommand::ResetAssociations { context: session.context });
        session.bump(1);

        match version {
            MrcpVersion::V1 => {
                self.process_resource_offer(
                    session,
                    0,
                    descriptor.resource_name.clone(),
                    None,
                    audio_mode_overrides.get_mut(0),
                    &mut answer,
                )
                .await;
            }
            MrcpVersion::V2 => {
                for control in descriptor.control.clone() {
                    self.process_resource_offer(
                        session,
                        control.id,
                        control.resource_name.clone(),
                        control.cmid,
                        None,
                        &mut answer,
                    )
                    .await;
                }
            }
        }

        self.process_audio_media(session, &descriptor, &audio_mode_overrides).await;

        session.pending_batch.add(MediaCommand::ApplyTopology { context: session.context });
        session.bump(1);

        session.answer = Some(answer);
        session.offer = Some(descriptor);

        self.drain_pending_batch(session).await;
        self.finish_answer(session);
    }

    /// Resolves and wires one control-media (resource) position (spec §4.3
    /// "Resource / control-media offer").
    async fn process_resource_offer(
        &self,
        session: &mut Session,
        id: usize,
        resource_name: Option<String>,
        cmid: Option<u32>,
        mode_override: Option<&mut StreamMode>,
        answer: &mut AnswerDescriptor,
    ) {
        let version = session.version.unwrap_or(MrcpVersion::V2);

        if let Some(existing) = session.channels.iter().position(|c| c.id == id) {
            if version == MrcpVersion::V2 {
                let control_channel = session.channels[existing].control_channel.clone();
                if let Some(cc) = control_channel {
                    session.bump(1);
                    let outcome = cc.modify().await;
                    if outcome == ModifyOutcome::Pending {
                        debug!(channel = id, "control channel modify pending");
                    }
                    session.decrement();
                }
            }
            if let Some(slot) = answer.control.get_mut(id) {
                *slot = Some(ControlMediaDescriptor {
                    id,
                    resource_name: session.channels[existing].resource_name.clone(),
                    cmid,
                    port: 0,
                });
            }
            return;
        }

        let mut channel = Channel::new(id, resource_name.clone(), cmid);

        let engine_config = resource_name
            .as_deref()
            .and_then(|name| session.profile.resolve(name).cloned());
        let Some(engine_config) = engine_config else {
            answer.status = AnswerStatus::NoSuchResource;
            session.channels.push(channel);
            return;
        };

        let engine_channel = self.channel_factory.create_engine_channel(&engine_config.resource_engine_id);
        let Some(engine_channel) = engine_channel else {
            answer.status = AnswerStatus::UnacceptableResource;
            session.channels.push(channel);
            return;
        };

        channel.resource_handle = Some(engine_config.resource_engine_id.clone());
        channel.control_channel = self.channel_factory.create_control_channel(version);
        channel.method_state_machine =
            Some(self.channel_factory.create_method_state_machine(&engine_config.resource_engine_id));
        channel.engine_channel = Some(engine_channel.clone());

        session.bump(1);
        let outcome = engine_channel.open().await;
        session.decrement();

        if !outcome.succeeded {
            answer.status = AnswerStatus::UnavailableResource;
            session.channels.push(channel);
            if let Some(slot) = answer.control.get_mut(id) {
                *slot = Some(ControlMediaDescriptor { id, resource_name, cmid, port: 0 });
            }
            return;
        }

        if let Some(termination) = outcome.termination {
            if let Some(mode) = mode_override {
                *mode |= termination.audio_stream.mode;
            }
            channel.engine_termination = Some(termination.id);
            channel.waiting_for_termination = true;
            session.pending_batch.add(MediaCommand::AddTermination {
                context: session.context,
                termination,
                descriptor: None,
            });
            session.bump(1);
        }

        if let Some(slot) = answer.control.get_mut(id) {
            *slot = Some(ControlMediaDescriptor { id, resource_name, cmid, port: 0 });
        }
        session.channels.push(channel);
    }

    /// Wires every audio media line to its RTP termination slot (spec §4.3
    /// "Audio-media offer").
    async fn process_audio_media(
        &self,
        session: &mut Session,
        descriptor: &OfferDescriptor,
        mode_overrides: &[StreamMode],
    ) {
        for (id, media) in descriptor.audio.iter().enumerate() {
            let override_mode = mode_overrides.get(id).copied().unwrap_or(StreamMode::NONE);

            let mut channel_ids: Vec<usize> = session
                .channels
                .iter()
                .filter(|c| media.mid.is_some() && c.cmid == media.mid)
                .map(|c| c.id)
                .collect();
            // MRCPv1 has exactly one implicit resource and one audio line;
            // there's no `cmid`/`mid` grouping to scan.
            if channel_ids.is_empty() && session.version == Some(MrcpVersion::V1) {
                channel_ids = session.channels.iter().map(|c| c.id).collect();
            }

            let rtp_descriptor = RtpDescriptor {
                local: Some(self.channel_factory.allocate_rtp_endpoint()),
                remote: Some(RtpEndpoint {
                    ip: media.ip.clone().unwrap_or_default(),
                    ext_ip: media.ext_ip.clone(),
                    port: media.port,
                }),
            };

            let existing_slot = session.termination_slots.iter().position(|s| s.id == id);
            let termination_id = if let Some(idx) = existing_slot {
                let term_id = session.termination_slots[idx].termination;
                session.termination_slots[idx].channels = channel_ids.clone();
                session.termination_slots[idx].waiting = true;
                session.pending_batch.add(MediaCommand::ModifyTermination {
                    context: session.context,
                    termination: term_id,
                    descriptor: rtp_descriptor,
                });
                session.bump(1);
                term_id
            } else {
                let mut termination = self.channel_factory.create_rtp_termination();
                termination.audio_stream.mode |= media.mode;
                termination.audio_stream.mode |= override_mode;
                let term_id = termination.id;

                let mut slot = TerminationSlot::new(id, media.mid, term_id);
                slot.channels = channel_ids.clone();
                slot.waiting = true;
                session.termination_slots.push(slot);

                session.pending_batch.add(MediaCommand::AddTermination {
                    context: session.context,
                    termination,
                    descriptor: Some(rtp_descriptor),
                });
                session.bump(1);
                term_id
            };

            for channel_id in &channel_ids {
                let engine_termination = session.channel_mut(*channel_id).and_then(|c| c.engine_termination);
                if let Some(engine_term) = engine_termination {
                    session.pending_batch.add(MediaCommand::AddAssociation {
                        context: session.context,
                        t1: termination_id,
                        t2: engine_term,
                    });
                    session.bump(1);
                }
            }
        }
    }

    async fn drain_pending_batch(&self, session: &mut Session) {
        let batch = std::mem::take(&mut session.pending_batch);
        if batch.is_empty() {
            return;
        }
        let responses = self.media_engine.send_batch(batch).await;
        for response in responses {
            self.handle_media_response(session, response);
        }
    }

    /// Bookkeeping for one media-engine completion (spec §4.3 "Termination
    /// response handling"). Every branch ends in exactly one decrement.
    fn handle_media_response(&self, session: &mut Session, response: MediaResponse) {
        match response.kind {
            CommandKind::AddTermination | CommandKind::ModifyTermination | CommandKind::SubtractTermination => {
                self.handle_termination_response(session, &response);
                session.decrement();
            }
            CommandKind::AddAssociation
            | CommandKind::RemoveAssociation
            | CommandKind::ResetAssociations
            | CommandKind::ApplyTopology
            | CommandKind::DestroyTopology => {
                session.decrement();
            }
        }
    }

    fn handle_termination_response(&self, session: &mut Session, response: &MediaResponse) {
        let Some(term_id) = response.termination else { return };

        if let Some(idx) = session.termination_slots.iter().position(|s| s.termination == term_id) {
            let was_waiting = session.termination_slots[idx].waiting;
            session.termination_slots[idx].waiting = false;
            if was_waiting {
                if let Some(local) = response.local.clone() {
                    let slot_id = session.termination_slots[idx].id;
                    let mid = session.termination_slots[idx].mid;
                    if let Some(answer_slot) = session.answer.as_mut().and_then(|a| a.audio.get_mut(slot_id)) {
                        *answer_slot = Some(AudioMediaDescriptor {
                            id: slot_id,
                            mid,
                            ip: Some(local.ip),
                            ext_ip: local.ext_ip,
                            port: local.port,
                            ..Default::default()
                        });
                    }
                }
            }
            return;
        }

        if let Some(channel) = session.channels.iter_mut().find(|c| c.engine_termination == Some(term_id)) {
            channel.waiting_for_termination = false;
        }
    }

    /// Sends the finished answer once every sub-request the offer batched
    /// has drained (spec §4.3 step 7). In this task-per-session model every
    /// await in [`Self::process_offer`] has already been awaited to
    /// completion by this point, so the count is always back to zero here —
    /// the assertion documents the invariant rather than guarding real
    /// asynchrony across messages.
    fn finish_answer(&self, session: &mut Session) {
        debug_assert!(session.is_quiesced(), "answer sent with sub-requests outstanding");
        if let Some(answer) = session.answer.take() {
            self.frontend.session_answer(answer);
        }
        session.enter_state(SessionState::None);
    }

    // ---- Control processing (spec §4.3 "Method state machine dispatch") ----

    async fn process_control(&self, session: &mut Session, channel: Option<usize>, message: ControlMessage) {
        let channel_id = match channel {
            Some(id) => id,
            None => session.channels.first().map(|c| c.id).unwrap_or(0),
        };

        let engine_channel = session.channel_mut(channel_id).and_then(|c| c.engine_channel.clone());
        let Some(engine_channel) = engine_channel else {
            warn!(session = %session.id, channel = channel_id, "control message for unknown channel dropped");
            return;
        };

        session.bump(1);
        let messages = engine_channel.process_request(message).await;
        session.decrement();

        for engine_message in messages {
            self.deliver_engine_message(session, channel_id, engine_message).await;
        }
    }

    /// Routes one resource-engine response or event back to the client (spec
    /// §4.3 "Response message... delivered to the client (MRCPv2 over
    /// control channel, MRCPv1 as a session-level control response)").
    /// Responses and events take the same transport split; the distinction
    /// that a response (not an event) advances the signaling queue is
    /// already satisfied here, since the task loop only reads the next
    /// queued message once the whole of [`Self::process_control`] returns.
    async fn deliver_engine_message(&self, session: &mut Session, channel_id: usize, engine_message: EngineMessage) {
        if engine_message.kind == EngineMessageKind::Event {
            debug!(session = %session.id, channel = channel_id, "engine event delivered");
        }

        match session.version.unwrap_or(MrcpVersion::V2) {
            MrcpVersion::V2 => {
                let control_channel = session.channel_mut(channel_id).and_then(|c| c.control_channel.clone());
                if let Some(cc) = control_channel {
                    cc.send_message(engine_message.message).await;
                }
            }
            MrcpVersion::V1 => {
                self.frontend.session_control_response(engine_message.message);
            }
        }
    }

    // ---- Terminate processing (spec §4.3 "Terminate processing") ----

    async fn process_terminate(&self, session: &mut Session) {
        session.enter_state(SessionState::Deactivating);

        let machines: Vec<_> = session.channels.iter().filter_map(|c| c.method_state_machine.clone()).collect();
        for machine in machines {
            session.bump(1);
            machine.deactivate().await;
            session.decrement();
        }

        session.enter_state(SessionState::Terminating);

        session.pending_batch.add(MediaCommand::ResetAssociations { context: session.context });
        session.bump(1);

        let channel_ids: Vec<usize> = session.channels.iter().map(|c| c.id).collect();
        for channel_id in channel_ids {
            let (control_channel, engine_channel, engine_termination) = {
                let channel = session.channel_mut(channel_id).expect("id just listed from this session");
                (channel.control_channel.clone(), channel.engine_channel.clone(), channel.engine_termination)
            };

            if let Some(cc) = control_channel {
                session.bump(1);
                cc.remove().await;
                session.decrement();
            }

            if let Some(term_id) = engine_termination {
                if let Some(channel) = session.channel_mut(channel_id) {
                    channel.waiting_for_termination = true;
                }
                session
                    .pending_batch
                    .add(MediaCommand::SubtractTermination { context: session.context, termination: term_id });
                session.bump(1);
            }

            if let Some(ec) = engine_channel {
                session.bump(1);
                ec.close().await;
                session.decrement();
            }
        }

        let slot_terminations: Vec<TerminationId> =
            session.termination_slots.iter().map(|s| s.termination).collect();
        for term_id in slot_terminations {
            if let Some(slot) = session.termination_slots.iter_mut().find(|s| s.termination == term_id) {
                slot.waiting = true;
            }
            session
                .pending_batch
                .add(MediaCommand::SubtractTermination { context: session.context, termination: term_id });
            session.bump(1);
        }

        self.drain_pending_batch(session).await;

        // Spec §4.3 step 2: the session leaves the table once its teardown
        // batch has been sent, not once it has fully drained.
        self.table.remove(&session.id);
        self.media_engine.destroy_context(session.context);

        debug_assert!(session.is_quiesced(), "terminate response sent with sub-requests outstanding");
        session.channels.clear();
        session.termination_slots.clear();
        self.frontend.session_terminate_response();
        session.enter_state(SessionState::None);
    }
}
