use crate::peer::NegotiationRole;
use crate::transport::{
    MediaConnection, MediaConnectionState, MediaEngine, MediaEventSink, TransportConfig,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use meshroom_core::{IceCandidate, ParticipantId, SdpKind, SessionDescription};
use std::sync::Arc;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine as RtcMediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::{API, APIBuilder};
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice::network_type::NetworkType;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_remote::TrackRemote;

/// Media engine backed by the `webrtc` crate.
pub struct WebRtcEngine {
    api: API,
    config: TransportConfig,
}

impl WebRtcEngine {
    pub fn new(config: TransportConfig) -> Result<Self> {
        // Default codecs and RTCP interceptors, shared by every connection.
        let mut m = RtcMediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let mut settings = SettingEngine::default();
        settings.set_network_types(vec![NetworkType::Udp4]);
        if config.include_loopback {
            settings.set_include_loopback_candidate(true);
        }

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .with_setting_engine(settings)
            .build();

        Ok(Self { api, config })
    }

    fn rtc_configuration(&self) -> RTCConfiguration {
        let ice_servers = if self.config.ice_servers.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: self.config.ice_servers.clone(),
                username: self.config.username.clone().unwrap_or_default(),
                credential: self.config.credential.clone().unwrap_or_default(),
                ..Default::default()
            }]
        };

        RTCConfiguration {
            ice_servers,
            ..Default::default()
        }
    }
}

#[async_trait]
impl MediaEngine for WebRtcEngine {
    async fn create_connection(
        &self,
        peer: ParticipantId,
        role: NegotiationRole,
        events: MediaEventSink,
    ) -> Result<Arc<dyn MediaConnection>> {
        let peer_connection = Arc::new(
            self.api
                .new_peer_connection(self.rtc_configuration())
                .await
                .context("Failed to create peer connection")?,
        );

        let state_events = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let events = state_events.clone();
                Box::pin(async move {
                    info!("Peer connection state for {}: {:?}", events.peer(), s);
                    if let Some(state) = map_state(s) {
                        events.state(state).await;
                    }
                })
            },
        ));

        // Trickle ICE: every local candidate goes out through signaling.
        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                events
                    .candidate(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_m_line_index: init.sdp_mline_index,
                    })
                    .await;
            })
        }));

        let track_events = events.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();
                Box::pin(async move {
                    events
                        .track(track.kind().to_string(), track.id().to_string())
                        .await;
                })
            },
        ));

        let dc_peer = peer;
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            Box::pin(async move {
                debug!("Data channel '{}' opened by {}", dc.label(), dc_peer);
            })
        }));

        if role == NegotiationRole::Initiator {
            // The offer has to carry the m-lines; the responder mirrors them.
            peer_connection
                .add_transceiver_from_kind(RTPCodecType::Audio, None)
                .await
                .context("Failed to add audio transceiver")?;
            peer_connection
                .add_transceiver_from_kind(RTPCodecType::Video, None)
                .await
                .context("Failed to add video transceiver")?;
            peer_connection
                .create_data_channel(&self.config.data_channel_label, None)
                .await
                .context("Failed to create data channel")?;
        }

        Ok(Arc::new(WebRtcConnection {
            peer,
            peer_connection,
        }))
    }
}

pub struct WebRtcConnection {
    peer: ParticipantId,
    peer_connection: Arc<RTCPeerConnection>,
}

#[async_trait]
impl MediaConnection for WebRtcConnection {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc(description)?)
            .await
            .context("Failed to set local description")?;
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc(description)?)
            .await
            .with_context(|| format!("Failed to set remote description from {}", self.peer))?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            ..Default::default()
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .with_context(|| format!("Failed to add ICE candidate from {}", self.peer))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription> {
    let desc = match description.kind {
        SdpKind::Offer => RTCSessionDescription::offer(description.sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(description.sdp)?,
    };
    Ok(desc)
}

fn map_state(state: RTCPeerConnectionState) -> Option<MediaConnectionState> {
    match state {
        RTCPeerConnectionState::New => Some(MediaConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(MediaConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(MediaConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(MediaConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(MediaConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(MediaConnectionState::Closed),
        _ => None,
    }
}
