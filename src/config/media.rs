use crate::media::profile::{
    ContainerFormat, QualityRung, Rendition, RenditionMatrix, Resolution,
};

/// (resolution, video bitrate kbps), highest first.
const RENDITION_SIZES: [(Resolution, u32); 4] = [
    (Resolution::new(1920, 1080), 5000),
    (Resolution::new(1280, 720), 2800),
    (Resolution::new(854, 480), 1400),
    (Resolution::new(640, 360), 800),
];

/// (name, resolution, video bitrate kbps), low to high.
const HLS_LADDER: [(&str, Resolution, u32); 3] = [
    ("360p", Resolution::new(640, 360), 800),
    ("480p", Resolution::new(842, 480), 1400),
    ("720p", Resolution::new(1280, 720), 2800),
];

const HLS_AUDIO_BITRATE_KBPS: u32 = 128;

pub const HLS_SEGMENT_SECONDS: u32 = 10;

pub const THUMBNAIL_RESOLUTION: Resolution = Resolution::new(320, 240);

/// Position of the poster frame, as a percentage of the source duration.
pub const THUMBNAIL_SEEK_PERCENT: u8 = 10;

/// Renditions are ordered per resolution, MP4 before WebM.
pub fn rendition_matrix() -> RenditionMatrix {
    let renditions = RENDITION_SIZES
        .iter()
        .flat_map(|&(resolution, video_bitrate_kbps)| {
            [ContainerFormat::Mp4, ContainerFormat::Webm]
                .into_iter()
                .map(move |format| Rendition {
                    format,
                    resolution,
                    video_bitrate_kbps,
                })
        })
        .collect();

    let ladder = HLS_LADDER
        .iter()
        .map(|&(name, resolution, video_bitrate_kbps)| QualityRung {
            name: name.to_string(),
            resolution,
            video_bitrate_kbps,
            audio_bitrate_kbps: HLS_AUDIO_BITRATE_KBPS,
        })
        .collect();

    RenditionMatrix::new(renditions, ladder)
}
