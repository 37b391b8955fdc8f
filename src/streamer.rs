// streamer.rs — 由低到高分辨率逐级加载全景纹理
//
// 严格串行：上一张上传完成后才发起下一张的加载请求。
// 失败的源会终止后续升级，但已显示的低分辨率纹理保留。

use image::io::Reader as ImageReader;
use image::{imageops, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread;

use crate::error::{Result, ViewerError};
use crate::math::{is_power_of_two, next_power_of_two};

/// Where decoded images end up (the GPU renderer, or a recorder in tests).
pub trait TextureSink {
    fn max_texture_dimension(&self) -> u32;

    fn requires_power_of_two(&self) -> bool {
        false
    }

    fn upload(&mut self, image: &RgbaImage) -> Result<()>;
}

pub struct LoadReply {
    pub index: usize,
    pub result: Result<RgbaImage>,
}

/// Starts one asynchronous load; the reply arrives on `reply`.
pub trait SourceLoader {
    fn request(&mut self, index: usize, source: &str, reply: Sender<LoadReply>);
}

// 后台线程解码
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadedLoader;

impl SourceLoader for ThreadedLoader {
    fn request(&mut self, index: usize, source: &str, reply: Sender<LoadReply>) {
        let source = source.to_string();
        thread::spawn(move || {
            let result = decode_file(&source);
            // 接收端已被替换（换了新的源列表）时直接丢弃
            let _ = reply.send(LoadReply { index, result });
        });
    }
}

pub fn decode_file(path: &str) -> Result<RgbaImage> {
    let file = File::open(path).map_err(|e| ViewerError::resource(path, e))?;
    let reader = BufReader::new(file);

    let img = ImageReader::new(reader)
        .with_guessed_format()
        .map_err(image::ImageError::IoError)
        .and_then(|mut r| {
            r.no_limits();
            r.decode()
        })
        .map_err(|e| ViewerError::resource(path, e))?;

    Ok(img.to_rgba8())
}

pub fn parse_source_list(src: &str) -> Vec<String> {
    src.split_whitespace().map(str::to_string).collect()
}

#[derive(Debug)]
pub enum StreamEvent {
    /// A source was uploaded. `first` marks the first upload of the current list.
    Loaded {
        index: usize,
        width: u32,
        height: u32,
        first: bool,
    },
    /// A source could not be used but streaming continues with the next one.
    Skipped { index: usize, error: ViewerError },
    /// A source failed; no higher resolution will be attempted.
    Failed { index: usize, error: ViewerError },
}

enum StreamState {
    Idle,
    Loading { index: usize },
    Pending { index: usize, image: RgbaImage },
    Halted,
    Finished,
}

pub struct TextureStreamer<L: SourceLoader> {
    sources: Vec<String>,
    loader: L,
    state: StreamState,
    // 每次请求新建通道，加载端丢弃 Sender 即可被察觉
    rx: Option<Receiver<LoadReply>>,
    current: Option<(usize, u32, u32)>,
    // 当前列表是否已上传过纹理
    list_ready: bool,
}

impl<L: SourceLoader> TextureStreamer<L> {
    pub fn new(loader: L) -> Self {
        Self {
            sources: Vec::new(),
            loader,
            state: StreamState::Idle,
            rx: None,
            current: None,
            list_ready: false,
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Replace the source list and request the first entry.
    ///
    /// Replies for the previous list are dropped. The current texture stays
    /// bound until the new list produces one.
    pub fn start(&mut self, sources: Vec<String>) {
        self.rx = None;
        self.list_ready = false;
        self.sources = sources;
        self.state = StreamState::Idle;
        self.request(0);
    }

    pub fn is_ready(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<(usize, u32, u32)> {
        self.current
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.state,
            StreamState::Loading { .. } | StreamState::Pending { .. }
        )
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, StreamState::Halted)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, StreamState::Finished)
    }

    pub fn has_pending_swap(&self) -> bool {
        matches!(self.state, StreamState::Pending { .. })
    }

    fn request(&mut self, index: usize) {
        match self.sources.get(index) {
            Some(src) => {
                log::info!("requesting source {} '{}'", index, src);
                let (tx, rx) = channel();
                self.rx = Some(rx);
                self.state = StreamState::Loading { index };
                self.loader.request(index, src, tx);
            }
            None => {
                log::debug!("all {} sources streamed", self.sources.len());
                self.state = StreamState::Finished;
            }
        }
    }

    fn try_recv(&self) -> std::result::Result<LoadReply, TryRecvError> {
        match &self.rx {
            Some(rx) => rx.try_recv(),
            None => Err(TryRecvError::Disconnected),
        }
    }

    fn source_name(&self, index: usize) -> &str {
        self.sources.get(index).map(String::as_str).unwrap_or("?")
    }

    /// Drive the chain. Call once at the top of every frame.
    ///
    /// `allow_swap` is false while an animation is running; the first texture
    /// is applied regardless so the viewer can become ready.
    pub fn poll(&mut self, allow_swap: bool, sink: &mut dyn TextureSink) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        loop {
            match std::mem::replace(&mut self.state, StreamState::Idle) {
                StreamState::Loading { index } => match self.try_recv() {
                    Ok(reply) if reply.index == index => match reply.result {
                        Ok(image) => self.state = StreamState::Pending { index, image },
                        Err(error) => {
                            log::error!("{}", error);
                            log::warn!(
                                "halting resolution upgrades after source {} '{}'",
                                index,
                                self.source_name(index)
                            );
                            self.state = StreamState::Halted;
                            events.push(StreamEvent::Failed { index, error });
                            break;
                        }
                    },
                    Ok(reply) => {
                        log::debug!("dropping stale reply for source {}", reply.index);
                        self.state = StreamState::Loading { index };
                    }
                    Err(TryRecvError::Empty) => {
                        self.state = StreamState::Loading { index };
                        break;
                    }
                    Err(TryRecvError::Disconnected) => {
                        let error = ViewerError::resource(
                            self.source_name(index),
                            "loader went away without replying",
                        );
                        log::error!("{}", error);
                        self.state = StreamState::Halted;
                        events.push(StreamEvent::Failed { index, error });
                        break;
                    }
                },
                StreamState::Pending { index, image } => {
                    if self.list_ready && !allow_swap {
                        self.state = StreamState::Pending { index, image };
                        break;
                    }
                    match self.apply(index, image, sink) {
                        Ok(event) => {
                            events.push(event);
                            self.request(index + 1);
                        }
                        Err(error @ ViewerError::Capability { .. }) => {
                            log::warn!(
                                "skipping source {} '{}': {}",
                                index,
                                self.source_name(index),
                                error
                            );
                            events.push(StreamEvent::Skipped { index, error });
                            self.request(index + 1);
                        }
                        Err(error) => {
                            log::error!("upload of source {} failed: {}", index, error);
                            self.state = StreamState::Halted;
                            events.push(StreamEvent::Failed { index, error });
                            break;
                        }
                    }
                }
                state @ (StreamState::Idle | StreamState::Halted | StreamState::Finished) => {
                    self.state = state;
                    break;
                }
            }
        }
        events
    }

    fn apply(
        &mut self,
        index: usize,
        image: RgbaImage,
        sink: &mut dyn TextureSink,
    ) -> Result<StreamEvent> {
        let (width, height) = image.dimensions();
        let image = prepare_for_upload(image, sink)?;
        sink.upload(&image)?;

        let first = !self.list_ready;
        self.list_ready = true;
        self.current = Some((index, width, height));
        log::info!(
            "source {} '{}' uploaded ({}x{}){}",
            index,
            self.source_name(index),
            width,
            height,
            if first { ", viewer ready" } else { "" }
        );
        Ok(StreamEvent::Loaded {
            index,
            width,
            height,
            first,
        })
    }
}

/// Rejects images over the sink's texture limit and pads to power-of-two
/// dimensions when the sink needs it.
pub fn prepare_for_upload(image: RgbaImage, sink: &dyn TextureSink) -> Result<RgbaImage> {
    let (w, h) = image.dimensions();
    let max = sink.max_texture_dimension();
    if w > max || h > max {
        return Err(ViewerError::Capability {
            width: w,
            height: h,
            max,
        });
    }
    if sink.requires_power_of_two() && !(is_power_of_two(w) && is_power_of_two(h)) {
        let (pw, ph) = (next_power_of_two(w), next_power_of_two(h));
        if pw > max || ph > max {
            return Err(ViewerError::Capability {
                width: pw,
                height: ph,
                max,
            });
        }
        log::debug!("resampling {}x{} to {}x{}", w, h, pw, ph);
        return Ok(imageops::resize(&image, pw, ph, imageops::FilterType::Triangle));
    }
    Ok(image)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn sources(list: &str) -> Vec<String> {
        parse_source_list(list)
    }

    #[test]
    fn parses_space_separated_sources() {
        assert_eq!(
            parse_source_list("  low.jpg   high.jpg "),
            vec!["low.jpg".to_string(), "high.jpg".to_string()]
        );
        assert!(parse_source_list("   ").is_empty());
    }

    #[test]
    fn loads_strictly_in_order() {
        let log = Log::default();
        let loader = ScriptedLoader::new(log.clone())
            .ok("a", 8, 4)
            .ok("b", 16, 8)
            .ok("c", 32, 16);
        let mut sink = RecordingSink::new(log.clone());
        let mut streamer = TextureStreamer::new(loader);
        streamer.start(sources("a b c"));
        let events = streamer.poll(true, &mut sink);

        assert_eq!(
            *log.borrow(),
            vec![
                "request:a",
                "upload:8x4",
                "request:b",
                "upload:16x8",
                "request:c",
                "upload:32x16"
            ]
        );
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], StreamEvent::Loaded { first: true, width: 8, height: 4, .. }));
        assert!(matches!(events[2], StreamEvent::Loaded { first: false, index: 2, .. }));
        assert!(streamer.is_finished());
        assert_eq!(streamer.current(), Some((2, 32, 16)));
    }

    #[test]
    fn failure_halts_upgrades_but_keeps_texture() {
        let log = Log::default();
        let loader = ScriptedLoader::new(log.clone()).ok("a", 8, 4).fail("b").ok("c", 32, 16);
        let mut sink = RecordingSink::new(log.clone());
        let mut streamer = TextureStreamer::new(loader);
        streamer.start(sources("a b c"));
        let events = streamer.poll(true, &mut sink);

        assert!(!log.borrow().iter().any(|l| l == "request:c"));
        assert!(matches!(events.last(), Some(StreamEvent::Failed { index: 1, .. })));
        assert!(streamer.is_halted());
        assert_eq!(streamer.current(), Some((0, 8, 4)));
        assert_eq!(sink.uploads.len(), 1);
    }

    #[test]
    fn oversized_source_is_skipped() {
        let log = Log::default();
        let loader = ScriptedLoader::new(log.clone()).ok("a", 8, 4).ok("huge", 64, 32).ok("c", 16, 8);
        let mut sink = RecordingSink::new(log.clone());
        sink.max = 32;
        let mut streamer = TextureStreamer::new(loader);
        streamer.start(sources("a huge c"));
        let events = streamer.poll(true, &mut sink);

        assert!(matches!(events[1], StreamEvent::Skipped { index: 1, .. }));
        assert_eq!(sink.uploads, vec![(8, 4), (16, 8)]);
        assert_eq!(streamer.current(), Some((2, 16, 8)));
    }

    #[test]
    fn swap_waits_until_allowed() {
        let log = Log::default();
        let loader = ScriptedLoader::new(log.clone()).ok("a", 8, 4).ok("b", 16, 8);
        let mut sink = RecordingSink::new(log.clone());
        let mut streamer = TextureStreamer::new(loader);
        streamer.start(sources("a b"));

        // 第一张不受动画阻挡
        let events = streamer.poll(false, &mut sink);
        assert_eq!(events.len(), 1);
        assert!(streamer.has_pending_swap());
        assert_eq!(sink.uploads.len(), 1);

        assert!(streamer.poll(false, &mut sink).is_empty());
        let events = streamer.poll(true, &mut sink);
        assert!(matches!(events[0], StreamEvent::Loaded { index: 1, first: false, .. }));
    }

    #[test]
    fn pending_load_stays_pending() {
        let log = Log::default();
        let mut loader = ScriptedLoader::new(log.clone()).ok("a", 8, 4);
        loader.hold.push("a".into());
        let mut sink = RecordingSink::new(log.clone());
        let mut streamer = TextureStreamer::new(loader);
        streamer.start(sources("a"));
        assert!(streamer.poll(true, &mut sink).is_empty());
        assert!(streamer.is_loading());
        assert!(!streamer.is_ready());
    }

    #[test]
    fn power_of_two_resample() {
        let log = Log::default();
        let mut sink = RecordingSink::new(log);
        sink.pot = true;
        let out = prepare_for_upload(RgbaImage::new(300, 150), &sink).unwrap();
        assert_eq!(out.dimensions(), (512, 256));
        let out = prepare_for_upload(RgbaImage::new(256, 128), &sink).unwrap();
        assert_eq!(out.dimensions(), (256, 128));
    }

    #[test]
    fn restart_discards_old_list() {
        let log = Log::default();
        let mut loader = ScriptedLoader::new(log.clone()).ok("a", 8, 4).ok("x", 4, 2);
        loader.hold.push("a".into());
        let mut sink = RecordingSink::new(log.clone());
        let mut streamer = TextureStreamer::new(loader);
        streamer.start(sources("a"));
        streamer.start(sources("x"));
        let events = streamer.poll(true, &mut sink);
        assert_eq!(events.len(), 1);
        assert_eq!(sink.uploads, vec![(4, 2)]);
    }

    /// 不回复就丢掉 Sender（比如解码线程 panic）
    struct SilentLoader;

    impl SourceLoader for SilentLoader {
        fn request(&mut self, _index: usize, _source: &str, reply: Sender<LoadReply>) {
            drop(reply);
        }
    }

    #[test]
    fn loader_hanging_up_halts_the_chain() {
        let mut sink = RecordingSink::new(Log::default());
        let mut streamer = TextureStreamer::new(SilentLoader);
        streamer.start(sources("a b"));

        let events = streamer.poll(true, &mut sink);
        assert!(matches!(events.as_slice(), [StreamEvent::Failed { index: 0, .. }]));
        assert!(streamer.is_halted());
        assert!(!streamer.is_loading());
        assert!(streamer.poll(true, &mut sink).is_empty());
    }

    #[test]
    fn new_list_reports_first_upload_again() {
        let log = Log::default();
        let loader = ScriptedLoader::new(log.clone()).ok("a", 8, 4).ok("x", 4, 2).ok("y", 8, 4);
        let mut sink = RecordingSink::new(log);
        let mut streamer = TextureStreamer::new(loader);
        streamer.start(sources("a"));
        streamer.poll(true, &mut sink);

        streamer.start(sources("x y"));
        // 新列表的第一张不受动画阻挡，第二张要等
        let events = streamer.poll(false, &mut sink);
        assert!(matches!(events.as_slice(), [StreamEvent::Loaded { index: 0, first: true, .. }]));
        assert!(streamer.has_pending_swap());
        let events = streamer.poll(true, &mut sink);
        assert!(matches!(events.as_slice(), [StreamEvent::Loaded { index: 1, first: false, .. }]));
    }
}
