use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use image::RgbImage;
use reqwest::Url;
use sendeagle_contracts::events::{EventLog, EventPayload};
use sendeagle_contracts::generation::{format_annotation, GenerationInfo, MetadataExtractor};
use sendeagle_contracts::naming::{image_filename, now_in_output_zone};
use sendeagle_contracts::params::RequestParams;
use sendeagle_contracts::tags::select_tags;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::SendEagleConfig;
use crate::eagle::{EagleClient, EagleTransport, HttpTransport, UploadItem};
use crate::encode::{encode_image, EmbeddedMetadata, EncodeOptions};
use crate::output::{write_new_file, OutputTarget, OUTPUT_TYPE};

/// Preview descriptor handed back to the host for one saved image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedImage {
    pub filename: String,
    pub subfolder: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    pub filename: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub positive: String,
    pub negative: String,
    pub images: Vec<SavedImage>,
    pub preview: bool,
    pub upload_failures: Vec<UploadFailure>,
}

impl BatchOutcome {
    /// Host-facing result: pass-through prompts, plus preview images when
    /// preview is enabled.
    pub fn host_payload(&self) -> Value {
        let mut payload = json!({
            "result": {
                "positive": self.positive,
                "negative": self.negative,
            }
        });
        if self.preview {
            payload["ui"] = json!({ "images": self.images });
        }
        payload
    }
}

type Clock = Box<dyn Fn() -> DateTime<FixedOffset>>;

/// Saves a batch locally and forwards each image to Eagle.
pub struct SendEagle<T = HttpTransport> {
    config: SendEagleConfig,
    eagle: EagleClient<T>,
    extractor: MetadataExtractor,
    events: EventLog,
    clock: Clock,
}

impl SendEagle<HttpTransport> {
    pub fn new(config: SendEagleConfig) -> Result<Self> {
        let eagle = EagleClient::connect(&config.eagle_server_url)?;
        Ok(Self::with_client(config, eagle))
    }
}

impl<T: EagleTransport> SendEagle<T> {
    pub fn with_client(config: SendEagleConfig, eagle: EagleClient<T>) -> Self {
        Self {
            config,
            eagle,
            extractor: MetadataExtractor::default(),
            events: EventLog::disabled(),
            clock: Box::new(now_in_output_zone),
        }
    }

    pub fn with_extractor(mut self, extractor: MetadataExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<FixedOffset> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &SendEagleConfig {
        &self.config
    }

    pub fn eagle(&self) -> &EagleClient<T> {
        &self.eagle
    }

    pub fn eagle_mut(&mut self) -> &mut EagleClient<T> {
        &mut self.eagle
    }

    /// Processes images strictly in order. Template and filesystem errors
    /// abort the batch; Eagle failures are logged and collected.
    pub fn add_items(&mut self, images: &[RgbImage], params: &RequestParams) -> Result<BatchOutcome> {
        let target = OutputTarget::prepare(&self.config.output_dir, &(self.clock)())?;
        self.record(
            "batch_started",
            json!({
                "count": images.len(),
                "subfolder": target.subfolder,
                "format": params.format.extension(),
                "save_only": params.save_only,
            }),
        );

        let mut outcome = BatchOutcome {
            positive: params.positive.clone(),
            negative: params.negative.clone(),
            images: Vec::with_capacity(images.len()),
            preview: params.preview,
            upload_failures: Vec::new(),
        };
        for (idx, image) in images.iter().enumerate() {
            let index = (images.len() > 1).then_some(idx);
            let saved = self
                .process_image(image, index, params, &target, &mut outcome.upload_failures)
                .with_context(|| format!("image {} of {} failed", idx + 1, images.len()))?;
            outcome.images.push(saved);
        }

        self.record(
            "batch_finished",
            json!({
                "count": outcome.images.len(),
                "upload_failures": outcome.upload_failures.len(),
            }),
        );
        Ok(outcome)
    }

    fn process_image(
        &mut self,
        image: &RgbImage,
        index: Option<usize>,
        params: &RequestParams,
        target: &OutputTarget,
        failures: &mut Vec<UploadFailure>,
    ) -> Result<SavedImage> {
        let info = self.extractor.extract(params, image.width(), image.height());
        let annotation = format_annotation(&info, &params.memo_text);
        let filename = image_filename(
            &params.filename_template,
            params.format.extension(),
            &info,
            index,
            &(self.clock)(),
        )?;

        let bytes = encode_image(
            image,
            &EncodeOptions::from_params(params),
            &EmbeddedMetadata::new(params, &annotation),
        )?;
        let path = target.path_for(&filename);
        write_new_file(&path, &bytes)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "image saved");
        self.record(
            "image_saved",
            json!({
                "filename": filename,
                "subfolder": target.subfolder,
                "seed": info.seed,
                "model": info.model_name,
            }),
        );

        if !params.save_only {
            if let Err(err) = self.upload(&filename, target, params, &info, annotation) {
                let error = format!("{err:#}");
                tracing::warn!(filename = %filename, error = %error, "eagle upload failed; continuing batch");
                self.record(
                    "eagle_item_failed",
                    json!({ "filename": filename, "error": error }),
                );
                failures.push(UploadFailure {
                    filename: filename.clone(),
                    error,
                });
            }
        }

        Ok(SavedImage {
            filename,
            subfolder: target.subfolder.clone(),
            kind: OUTPUT_TYPE.to_string(),
        })
    }

    fn upload(
        &mut self,
        filename: &str,
        target: &OutputTarget,
        params: &RequestParams,
        info: &GenerationInfo,
        annotation: String,
    ) -> Result<()> {
        let folder_id = self.eagle.resolve_folder(&params.eagle_folder);
        let item = UploadItem {
            url: self.view_url(filename, &target.subfolder)?,
            name: filename.to_string(),
            annotation,
            tags: select_tags(params.save_tags, info),
            folder_id,
        };
        self.eagle.add_item_from_url(&item)?;
        tracing::info!(filename = %filename, folder = ?item.folder_id, tags = item.tags.len(), "eagle item added");
        self.record(
            "eagle_item_added",
            json!({ "filename": filename, "folder_id": item.folder_id, "tags": item.tags }),
        );
        Ok(())
    }

    /// Host URL Eagle downloads the saved file from.
    pub fn view_url(&self, filename: &str, subfolder: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &format!("{}/api/view", self.config.host_url),
            &[
                ("filename", filename),
                ("type", OUTPUT_TYPE),
                ("subfolder", subfolder),
            ],
        )
        .with_context(|| format!("invalid host url '{}'", self.config.host_url))?;
        Ok(url.to_string())
    }

    fn record(&self, event_type: &str, payload: Value) {
        let payload: EventPayload = match payload {
            Value::Object(map) => map,
            _ => EventPayload::new(),
        };
        if let Err(err) = self.events.emit(event_type, payload) {
            tracing::warn!(event = event_type, error = %format!("{err:#}"), "event log write failed");
        }
    }
}
