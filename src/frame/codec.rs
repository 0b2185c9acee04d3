//! Codec identifiers and their FFmpeg `AVCodecID` counterparts

use serde::{Deserialize, Serialize};

/// Codec tag carried in frame metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CodecId {
    #[default]
    Unused,
    Mpeg1,
    Mpeg2,
    H263,
    Mpeg4,
    Wmv,
    Avc,
    Mjpeg,
    Vp8,
    Vp9,
    Hevc,
    Vc1,
    Avs,
    AvsPlus,
    Flv1,
    Jpeg,
}

// FFmpeg AVCodecID values
const AV_CODEC_ID_MPEG1VIDEO: i32 = 1;
const AV_CODEC_ID_MPEG2VIDEO: i32 = 2;
const AV_CODEC_ID_H263: i32 = 4;
const AV_CODEC_ID_MJPEG: i32 = 7;
const AV_CODEC_ID_MPEG4: i32 = 12;
const AV_CODEC_ID_FLV1: i32 = 21;
const AV_CODEC_ID_H264: i32 = 27;
const AV_CODEC_ID_VC1: i32 = 70;
const AV_CODEC_ID_WMV3: i32 = 71;
const AV_CODEC_ID_AVS: i32 = 82;
const AV_CODEC_ID_CAVS: i32 = 87;
const AV_CODEC_ID_VP8: i32 = 139;
const AV_CODEC_ID_VP9: i32 = 167;
const AV_CODEC_ID_HEVC: i32 = 173;

/// (codec, FFmpeg id, short name); lookups take the first match
const CODEC_TABLE: &[(CodecId, i32, &str)] = &[
    (CodecId::Mpeg1, AV_CODEC_ID_MPEG1VIDEO, "mpeg1"),
    (CodecId::Mpeg2, AV_CODEC_ID_MPEG2VIDEO, "mpeg2"),
    (CodecId::H263, AV_CODEC_ID_H263, "h263"),
    (CodecId::Mpeg4, AV_CODEC_ID_MPEG4, "mpeg4"),
    (CodecId::Wmv, AV_CODEC_ID_WMV3, "wmv3"),
    (CodecId::Avc, AV_CODEC_ID_H264, "h264"),
    (CodecId::Mjpeg, AV_CODEC_ID_MJPEG, "mjpeg"),
    (CodecId::Vp8, AV_CODEC_ID_VP8, "vp8"),
    (CodecId::Vp9, AV_CODEC_ID_VP9, "vp9"),
    (CodecId::Hevc, AV_CODEC_ID_HEVC, "hevc"),
    (CodecId::Vc1, AV_CODEC_ID_VC1, "vc1"),
    (CodecId::Avs, AV_CODEC_ID_AVS, "avs"),
    (CodecId::Avs, AV_CODEC_ID_CAVS, "cavs"),
    (CodecId::AvsPlus, AV_CODEC_ID_CAVS, "avs+"),
    (CodecId::Flv1, AV_CODEC_ID_FLV1, "flv1"),
];

impl CodecId {
    /// Map an FFmpeg codec id; unknown ids give `Unused`
    pub fn from_ffmpeg(av_codec_id: i32) -> Self {
        CODEC_TABLE
            .iter()
            .find(|(_, av, _)| *av == av_codec_id)
            .map(|(codec, _, _)| *codec)
            .unwrap_or(CodecId::Unused)
    }

    /// FFmpeg codec id, if FFmpeg has a demuxer-side equivalent
    pub fn to_ffmpeg(&self) -> Option<i32> {
        CODEC_TABLE
            .iter()
            .find(|(codec, _, _)| codec == self)
            .map(|(_, av, _)| *av)
    }

    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name == "jpeg" {
            return CodecId::Jpeg;
        }
        CODEC_TABLE
            .iter()
            .find(|(_, _, n)| *n == name)
            .map(|(codec, _, _)| *codec)
            .unwrap_or(CodecId::Unused)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CodecId::Unused => "unused",
            CodecId::Jpeg => "jpeg",
            codec => CODEC_TABLE
                .iter()
                .find(|(c, _, _)| c == codec)
                .map(|(_, _, n)| *n)
                .unwrap_or("unused"),
        }
    }
}
