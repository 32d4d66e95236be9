//! Static field tables for every `(StatType, TrackKind)` pair.
//!
//! Field lists are shared between entries as slices; an entry is the ordered
//! concatenation of its sections.

use rtcscope_domain::constants::SCREENSHARE_CONTENT_TYPE;
use rtcscope_domain::{StatType, TrackKind, ValueKind};

use super::{Activation, FieldSpec, InstrumentKind, SchemaEntry, Section};

/* -------------------------------------------------------------------------- */
/* Field constructors */
/* -------------------------------------------------------------------------- */

const fn trace(source: &'static str, value: ValueKind) -> FieldSpec {
    FieldSpec { source, attribute: source, value, metric: None }
}

const fn number(source: &'static str) -> FieldSpec {
    trace(source, ValueKind::Number)
}

const fn text(source: &'static str) -> FieldSpec {
    trace(source, ValueKind::Text)
}

const fn flag(source: &'static str) -> FieldSpec {
    trace(source, ValueKind::Flag)
}

const fn renamed(source: &'static str, attribute: &'static str, value: ValueKind) -> FieldSpec {
    FieldSpec { source, attribute, value, metric: None }
}

const fn counter(source: &'static str) -> FieldSpec {
    FieldSpec { source, attribute: source, value: ValueKind::Number, metric: Some(InstrumentKind::Counter) }
}

const fn gauge(source: &'static str) -> FieldSpec {
    FieldSpec { source, attribute: source, value: ValueKind::Number, metric: Some(InstrumentKind::Gauge) }
}

const fn histogram(source: &'static str) -> FieldSpec {
    FieldSpec {
        source,
        attribute: source,
        value: ValueKind::Number,
        metric: Some(InstrumentKind::Histogram),
    }
}

/// Boolean reported as a 1/0 gauge.
const fn flag_gauge(source: &'static str) -> FieldSpec {
    FieldSpec { source, attribute: source, value: ValueKind::Flag, metric: Some(InstrumentKind::Gauge) }
}

/// Text field counted once per record, with the text as a dimension.
const fn occurrences(source: &'static str) -> FieldSpec {
    FieldSpec { source, attribute: source, value: ValueKind::Text, metric: Some(InstrumentKind::Counter) }
}

const fn always(fields: &'static [FieldSpec]) -> Section {
    Section { activation: Activation::Always, segment: None, fields }
}

/* -------------------------------------------------------------------------- */
/* codec */
/* -------------------------------------------------------------------------- */

const CODEC: &[FieldSpec] = &[
    renamed("id", "codecId", ValueKind::Text),
    occurrences("mimeType"),
    histogram("clockRate"),
    occurrences("sdpFmtpLine"),
];

const CODEC_AUDIO_CHANNELS: &[FieldSpec] = &[gauge("channels")];

const CODEC_CHANNELS: &[FieldSpec] = &[number("channels")];

/* -------------------------------------------------------------------------- */
/* outbound-rtp */
/* -------------------------------------------------------------------------- */

const OUTBOUND_RTP: &[FieldSpec] = &[
    number("ssrc"),
    text("kind"),
    text("mediaType"),
    counter("bytesSent"),
    counter("packetsSent"),
    counter("headerBytesSent"),
    text("mediaSourceId"),
    text("mid"),
    counter("nackCount"),
    text("remoteId"),
    counter("retransmittedBytesSent"),
    counter("retransmittedPacketsSent"),
    gauge("targetBitrate"),
    counter("totalPacketSendDelay"),
    text("codecId"),
    text("transportId"),
    flag("active"),
];

const OUTBOUND_RTP_ENCODER: &[FieldSpec] = &[
    occurrences("encoderImplementation"),
    counter("framesEncoded"),
    gauge("frameHeight"),
    gauge("frameWidth"),
    gauge("framesPerSecond"),
    counter("framesSent"),
    number("hugeFramesSent"),
    counter("keyFramesEncoded"),
    flag("powerEfficientEncoder"),
    number("qpSum"),
    trace("qualityLimitationDurations", ValueKind::Json),
    text("qualityLimitationReason"),
    number("qualityLimitationResolutionChanges"),
    text("rid"),
    number("rtxSsrc"),
    text("scalabilityMode"),
    counter("totalEncodeTime"),
    number("totalEncodedBytesTarget"),
];

const OUTBOUND_RTP_CONTENT_TYPE: &[FieldSpec] = &[occurrences("contentType")];

const SCREENSHARE: Activation =
    Activation::TextEquals { field: "contentType", value: SCREENSHARE_CONTENT_TYPE };

/* -------------------------------------------------------------------------- */
/* remote-outbound-rtp */
/* -------------------------------------------------------------------------- */

const REMOTE_OUTBOUND_RTP: &[FieldSpec] = &[
    number("ssrc"),
    text("kind"),
    text("mediaType"),
    counter("bytesSent"),
    counter("packetsSent"),
    text("localId"),
    number("remoteTimestamp"),
    counter("reportsSent"),
    counter("roundTripTimeMeasurements"),
    counter("totalRoundTripTime"),
    text("codecId"),
    text("transportId"),
];

/* -------------------------------------------------------------------------- */
/* inbound-rtp */
/* -------------------------------------------------------------------------- */

const INBOUND_RTP: &[FieldSpec] = &[
    number("ssrc"),
    text("kind"),
    text("mediaType"),
    counter("bytesReceived"),
    counter("packetsReceived"),
    gauge("jitter"),
    counter("packetsLost"),
];

const INBOUND_RTP_RECEIVER: &[FieldSpec] = &[
    counter("headerBytesReceived"),
    counter("jitterBufferDelay"),
    counter("jitterBufferEmittedCount"),
    counter("jitterBufferMinimumDelay"),
    counter("jitterBufferTargetDelay"),
    gauge("lastPacketReceivedTimestamp"),
    text("mid"),
    counter("nackCount"),
    text("remoteId"),
    text("trackIdentifier"),
];

const INBOUND_RTP_AUDIO: &[FieldSpec] = &[
    gauge("audioLevel"),
    counter("concealedSamples"),
    counter("concealmentEvents"),
    counter("fecPacketsDiscarded"),
    counter("fecPacketsReceived"),
    counter("insertedSamplesForDeceleration"),
    counter("packetsDiscarded"),
    text("playoutId"),
    counter("removedSamplesForAcceleration"),
    counter("silentConcealedSamples"),
    counter("totalAudioEnergy"),
    counter("totalSamplesDuration"),
    counter("totalSamplesReceived"),
];

const INBOUND_RTP_VIDEO: &[FieldSpec] = &[
    occurrences("decoderImplementation"),
    counter("firCount"),
    gauge("frameHeight"),
    gauge("frameWidth"),
    counter("framesAssembledFromMultiplePackets"),
    counter("framesDecoded"),
    counter("framesDropped"),
    gauge("framesPerSecond"),
    counter("framesReceived"),
    counter("freezeCount"),
    counter("keyFramesDecoded"),
    counter("pauseCount"),
    counter("pliCount"),
    flag_gauge("powerEfficientDecoder"),
    counter("qpSum"),
    counter("totalAssemblyTime"),
    counter("totalDecodeTime"),
    counter("totalFreezesDuration"),
    counter("totalInterFrameDelay"),
    counter("totalPausesDuration"),
    counter("totalProcessingDelay"),
    counter("totalSquaredInterFrameDelay"),
];

const INBOUND_RTP_AGGREGATE: &[FieldSpec] = &[
    counter("packetsDiscarded"),
    text("playoutId"),
    counter("totalAudioEnergy"),
    counter("totalSamplesDuration"),
    counter("totalSamplesReceived"),
];

/* -------------------------------------------------------------------------- */
/* remote-inbound-rtp */
/* -------------------------------------------------------------------------- */

const REMOTE_INBOUND_RTP: &[FieldSpec] = &[
    number("ssrc"),
    text("kind"),
    text("mediaType"),
    gauge("jitter"),
    counter("packetsLost"),
    gauge("fractionLost"),
    text("localId"),
    histogram("roundTripTime"),
    counter("roundTripTimeMeasurements"),
    counter("totalRoundTripTime"),
    text("codecId"),
    text("transportId"),
];

/* -------------------------------------------------------------------------- */
/* candidate-pair */
/* -------------------------------------------------------------------------- */

const CANDIDATE_PAIR: &[FieldSpec] = &[
    number("availableIncomingBitrate"),
    number("availableOutgoingBitrate"),
    number("bytesDiscardedOnSend"),
    counter("bytesReceived"),
    counter("bytesSent"),
    number("consentRequestsSent"),
    histogram("currentRoundTripTime"),
    number("lastPacketReceivedTimestamp"),
    number("lastPacketSentTimestamp"),
    text("localCandidateId"),
    flag("nominated"),
    number("packetsDiscardedOnSend"),
    counter("packetsReceived"),
    counter("packetsSent"),
    number("priority"),
    text("remoteCandidateId"),
    number("requestsReceived"),
    number("requestsSent"),
    number("responsesReceived"),
    number("responsesSent"),
    text("state"),
    counter("totalRoundTripTime"),
    text("transportId"),
    flag("writable"),
];

/* -------------------------------------------------------------------------- */
/* transport / data-channel (trace only) */
/* -------------------------------------------------------------------------- */

const TRANSPORT: &[FieldSpec] = &[
    number("bytesReceived"),
    number("bytesSent"),
    text("dtlsCipher"),
    text("dtlsRole"),
    text("dtlsState"),
    text("iceLocalUsernameFragment"),
    text("iceRole"),
    text("iceState"),
    text("localCertificateId"),
    number("packetsReceived"),
    number("packetsSent"),
    text("remoteCertificateId"),
    number("selectedCandidatePairChanges"),
    text("selectedCandidatePairId"),
    text("srtpCipher"),
    text("tlsVersion"),
];

const DATA_CHANNEL: &[FieldSpec] = &[
    renamed("dataChannelId", "datachannelid", ValueKind::Number),
    text("state"),
    number("messagesSent"),
    number("bytesSent"),
    number("messagesReceived"),
    number("bytesReceived"),
];

/* -------------------------------------------------------------------------- */
/* media-source / media-playout */
/* -------------------------------------------------------------------------- */

const MEDIA_SOURCE: &[FieldSpec] = &[text("trackIdentifier"), text("kind")];

const MEDIA_SOURCE_AUDIO: &[FieldSpec] = &[
    gauge("audioLevel"),
    counter("totalAudioEnergy"),
    counter("totalSamplesDuration"),
    gauge("echoReturnLoss"),
    gauge("echoReturnLossEnhancement"),
];

const MEDIA_SOURCE_VIDEO: &[FieldSpec] = &[
    counter("frames"),
    gauge("framesPerSecond"),
    gauge("height"),
    gauge("width"),
];

const MEDIA_PLAYOUT: &[FieldSpec] = &[
    text("kind"),
    counter("synthesizedSamplesDuration"),
    counter("synthesizedSamplesEvents"),
    counter("totalPlayoutDelay"),
    counter("totalSamplesCount"),
    counter("totalSamplesDuration"),
];

/* -------------------------------------------------------------------------- */
/* Section lists */
/* -------------------------------------------------------------------------- */

const CODEC_AUDIO_SECTIONS: &[Section] = &[always(CODEC), always(CODEC_AUDIO_CHANNELS)];
const CODEC_SECTIONS: &[Section] = &[always(CODEC), always(CODEC_CHANNELS)];

const OUTBOUND_RTP_AUDIO_SECTIONS: &[Section] = &[always(OUTBOUND_RTP)];
const OUTBOUND_RTP_VIDEO_SECTIONS: &[Section] = &[always(OUTBOUND_RTP), always(OUTBOUND_RTP_ENCODER)];
const OUTBOUND_RTP_AGGREGATE_SECTIONS: &[Section] = &[
    always(OUTBOUND_RTP),
    Section { activation: SCREENSHARE, segment: Some("screenshare"), fields: OUTBOUND_RTP_CONTENT_TYPE },
    Section { activation: SCREENSHARE, segment: Some("screenshare"), fields: OUTBOUND_RTP_ENCODER },
];

const REMOTE_OUTBOUND_RTP_SECTIONS: &[Section] = &[always(REMOTE_OUTBOUND_RTP)];

const INBOUND_RTP_AUDIO_SECTIONS: &[Section] =
    &[always(INBOUND_RTP), always(INBOUND_RTP_RECEIVER), always(INBOUND_RTP_AUDIO)];
const INBOUND_RTP_VIDEO_SECTIONS: &[Section] =
    &[always(INBOUND_RTP), always(INBOUND_RTP_RECEIVER), always(INBOUND_RTP_VIDEO)];
const INBOUND_RTP_AGGREGATE_SECTIONS: &[Section] =
    &[always(INBOUND_RTP), always(INBOUND_RTP_RECEIVER), always(INBOUND_RTP_AGGREGATE)];

const REMOTE_INBOUND_RTP_SECTIONS: &[Section] = &[always(REMOTE_INBOUND_RTP)];
const CANDIDATE_PAIR_SECTIONS: &[Section] = &[always(CANDIDATE_PAIR)];
const TRANSPORT_SECTIONS: &[Section] = &[always(TRANSPORT)];
const DATA_CHANNEL_SECTIONS: &[Section] = &[always(DATA_CHANNEL)];

const MEDIA_SOURCE_AUDIO_SECTIONS: &[Section] = &[always(MEDIA_SOURCE), always(MEDIA_SOURCE_AUDIO)];
const MEDIA_SOURCE_VIDEO_SECTIONS: &[Section] = &[always(MEDIA_SOURCE), always(MEDIA_SOURCE_VIDEO)];

const MEDIA_PLAYOUT_SECTIONS: &[Section] = &[always(MEDIA_PLAYOUT)];

/* -------------------------------------------------------------------------- */
/* Entries */
/* -------------------------------------------------------------------------- */

const fn entry(
    stat_type: StatType,
    track_kind: TrackKind,
    sections: &'static [Section],
) -> SchemaEntry {
    SchemaEntry { stat_type, track_kind, sections }
}

pub(super) static ENTRIES: &[SchemaEntry] = &[
    entry(StatType::Codec, TrackKind::Audio, CODEC_AUDIO_SECTIONS),
    entry(StatType::Codec, TrackKind::Video, CODEC_SECTIONS),
    entry(StatType::Codec, TrackKind::AllTracks, CODEC_SECTIONS),
    entry(StatType::OutboundRtp, TrackKind::Audio, OUTBOUND_RTP_AUDIO_SECTIONS),
    entry(StatType::OutboundRtp, TrackKind::Video, OUTBOUND_RTP_VIDEO_SECTIONS),
    entry(StatType::OutboundRtp, TrackKind::AllTracks, OUTBOUND_RTP_AGGREGATE_SECTIONS),
    entry(StatType::RemoteOutboundRtp, TrackKind::Audio, REMOTE_OUTBOUND_RTP_SECTIONS),
    entry(StatType::RemoteOutboundRtp, TrackKind::Video, REMOTE_OUTBOUND_RTP_SECTIONS),
    entry(StatType::RemoteOutboundRtp, TrackKind::AllTracks, REMOTE_OUTBOUND_RTP_SECTIONS),
    entry(StatType::InboundRtp, TrackKind::Audio, INBOUND_RTP_AUDIO_SECTIONS),
    entry(StatType::InboundRtp, TrackKind::Video, INBOUND_RTP_VIDEO_SECTIONS),
    entry(StatType::InboundRtp, TrackKind::AllTracks, INBOUND_RTP_AGGREGATE_SECTIONS),
    entry(StatType::RemoteInboundRtp, TrackKind::Audio, REMOTE_INBOUND_RTP_SECTIONS),
    entry(StatType::RemoteInboundRtp, TrackKind::Video, REMOTE_INBOUND_RTP_SECTIONS),
    entry(StatType::RemoteInboundRtp, TrackKind::AllTracks, REMOTE_INBOUND_RTP_SECTIONS),
    entry(StatType::CandidatePair, TrackKind::Audio, CANDIDATE_PAIR_SECTIONS),
    entry(StatType::CandidatePair, TrackKind::Video, CANDIDATE_PAIR_SECTIONS),
    entry(StatType::CandidatePair, TrackKind::AllTracks, CANDIDATE_PAIR_SECTIONS),
    entry(StatType::Transport, TrackKind::Audio, TRANSPORT_SECTIONS),
    entry(StatType::Transport, TrackKind::Video, TRANSPORT_SECTIONS),
    entry(StatType::Transport, TrackKind::AllTracks, TRANSPORT_SECTIONS),
    entry(StatType::DataChannel, TrackKind::Audio, DATA_CHANNEL_SECTIONS),
    entry(StatType::DataChannel, TrackKind::Video, DATA_CHANNEL_SECTIONS),
    entry(StatType::DataChannel, TrackKind::AllTracks, DATA_CHANNEL_SECTIONS),
    entry(StatType::MediaSource, TrackKind::Audio, MEDIA_SOURCE_AUDIO_SECTIONS),
    entry(StatType::MediaSource, TrackKind::Video, MEDIA_SOURCE_VIDEO_SECTIONS),
    entry(StatType::MediaSource, TrackKind::AllTracks, MEDIA_SOURCE_AUDIO_SECTIONS),
    entry(StatType::MediaPlayout, TrackKind::Audio, MEDIA_PLAYOUT_SECTIONS),
    entry(StatType::MediaPlayout, TrackKind::Video, MEDIA_PLAYOUT_SECTIONS),
    entry(StatType::MediaPlayout, TrackKind::AllTracks, MEDIA_PLAYOUT_SECTIONS),
];
