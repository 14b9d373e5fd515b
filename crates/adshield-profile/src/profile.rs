//! One Adblock-format subscription profile.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use chrono::{DateTime, Duration, Utc};
use tempfile::NamedTempFile;
use tokio::runtime::Handle;
use tracing::debug;
use url::Url;

use adshield_core::matcher::{RequestContext, UrlMatcher};
use adshield_core::types::{CheckResult, CosmeticFiltersResult, ResourceType};
use adshield_parser::checksum;
use adshield_parser::header::{self, HeaderError};
use adshield_parser::{FilterListParser, FilterSet, ParserSettings};

use crate::console::{ConsoleSink, MessageCategory, MessageLevel, TracingConsole};
use crate::error::{FetchError, ProfileError};
use crate::job::DataFetchJob;

/// Directory under the data dir where cached subscription files live.
const PROFILES_DIR: &str = "contentBlocking";

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ProfileFlags: u8 {
        /// The title was set by the user and header scans must not replace it.
        const HAS_CUSTOM_TITLE = 1 << 0;
        /// The update URL was overridden by the user.
        const HAS_CUSTOM_UPDATE_URL = 1 << 1;
    }
}

impl Default for ProfileFlags {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileCategory {
    #[default]
    Other,
    Advertisements,
    Annoyance,
    Privacy,
    Regional,
}

/// Descriptor supplied by the host's registry when constructing a profile.
/// The core treats that registry as opaque.
#[derive(Debug, Clone, Default)]
pub struct ProfileDescriptor {
    /// Filesystem-safe identifier; the cached file is `<name>.txt`.
    pub name: String,
    pub title: String,
    pub update_url: Option<Url>,
    /// Locale tags this list targets; empty means any.
    pub languages: Vec<String>,
    pub last_update: Option<DateTime<Utc>>,
    /// Update interval in days; zero or negative disables scheduled updates.
    pub update_interval: i64,
    pub category: ProfileCategory,
    pub flags: ProfileFlags,
}

/// A named, versioned subscription of filter rules.
///
/// The profile exclusively owns its trie and cosmetic tables. All mutating
/// operations must be invoked from the thread that constructed the profile;
/// the matcher is read-only once loaded.
pub struct FilterProfile {
    name: String,
    title: String,
    update_url: Option<Url>,
    languages: Vec<String>,
    last_update: Option<DateTime<Utc>>,
    update_interval: i64,
    category: ProfileCategory,
    flags: ProfileFlags,
    error: ProfileError,

    path: PathBuf,
    settings: ParserSettings,
    console: Arc<dyn ConsoleSink>,

    filters: Option<FilterSet>,
    fetch_job: Option<DataFetchJob>,
    is_empty: bool,
    was_loaded: bool,

    owner: ThreadId,
    on_modified: Option<Box<dyn Fn()>>,
    on_progress: Option<Box<dyn Fn(i32)>>,
    reported_progress: i32,
}

impl FilterProfile {
    /// Construct a profile over `<data_dir>/contentBlocking/<name>.txt` and
    /// scan its header.
    pub fn new(
        descriptor: ProfileDescriptor,
        data_dir: impl Into<PathBuf>,
        settings: ParserSettings,
        console: Arc<dyn ConsoleSink>,
    ) -> Self {
        let path = data_dir
            .into()
            .join(PROFILES_DIR)
            .join(format!("{}.txt", descriptor.name));

        Self::with_path(descriptor, path, settings, console)
    }

    /// Construct a profile over an explicit file path.
    pub fn with_path(
        descriptor: ProfileDescriptor,
        path: impl Into<PathBuf>,
        settings: ParserSettings,
        console: Arc<dyn ConsoleSink>,
    ) -> Self {
        let mut profile = Self {
            name: descriptor.name,
            title: descriptor.title,
            update_url: descriptor.update_url,
            languages: descriptor.languages,
            last_update: descriptor.last_update,
            update_interval: descriptor.update_interval,
            category: descriptor.category,
            flags: descriptor.flags,
            error: ProfileError::None,
            path: path.into(),
            settings,
            console,
            filters: None,
            fetch_job: None,
            is_empty: true,
            was_loaded: false,
            owner: thread::current().id(),
            on_modified: None,
            on_progress: None,
            reported_progress: -1,
        };

        profile.load_header();
        profile
    }

    /// Construct over an existing list file with defaults, naming the
    /// profile after the file stem.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let descriptor = ProfileDescriptor {
            name: path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ..ProfileDescriptor::default()
        };

        Self::with_path(
            descriptor,
            path,
            ParserSettings::default(),
            Arc::new(TracingConsole),
        )
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn update_url(&self) -> Option<&Url> {
        self.update_url.as_ref()
    }

    /// Locale tags this list targets; empty means any.
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// True when the list targets the given locale tag.
    pub fn matches_language(&self, tag: &str) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|language| language == tag)
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn update_interval(&self) -> i64 {
        self.update_interval
    }

    pub fn category(&self) -> ProfileCategory {
        self.category
    }

    pub fn flags(&self) -> ProfileFlags {
        self.flags
    }

    pub fn error(&self) -> ProfileError {
        self.error
    }

    pub fn is_updating(&self) -> bool {
        self.fetch_job.is_some()
    }

    pub fn was_loaded(&self) -> bool {
        self.was_loaded
    }

    /// Path of the cached subscription file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register the host's modification observer, invoked on every metadata
    /// change.
    pub fn set_modified_handler(&mut self, handler: Box<dyn Fn()>) {
        self.on_modified = Some(handler);
    }

    /// Register the host's progress observer, invoked on the owning thread
    /// whenever the reported download percentage changes; `-1` means no
    /// fetch is active.
    pub fn set_progress_handler(&mut self, handler: Box<dyn Fn(i32)>) {
        self.on_progress = Some(handler);
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if title != self.title {
            self.title = title;
            self.flags |= ProfileFlags::HAS_CUSTOM_TITLE;
            self.notify_modified();
        }
    }

    pub fn set_update_url(&mut self, url: Url) {
        if self.update_url.as_ref() != Some(&url) {
            self.update_url = Some(url);
            self.flags |= ProfileFlags::HAS_CUSTOM_UPDATE_URL;
            self.notify_modified();
        }
    }

    pub fn set_category(&mut self, category: ProfileCategory) {
        if category != self.category {
            self.category = category;
            self.notify_modified();
        }
    }

    pub fn set_update_interval(&mut self, interval: i64) {
        if interval != self.update_interval {
            self.update_interval = interval;
            self.notify_modified();
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Scan the header: pick up the title and the emptiness hint.
    pub fn load_header(&mut self) {
        match header::scan_header_file(&self.path) {
            Ok(info) => {
                if !self.flags.contains(ProfileFlags::HAS_CUSTOM_TITLE) {
                    if let Some(title) = info.title {
                        self.title = title;
                    }
                }
                self.is_empty = info.is_empty;
            }
            Err(HeaderError::InvalidHeader) => {
                self.raise_error(
                    "failed to load content blocking profile: invalid header".to_string(),
                    ProfileError::Parse,
                );
            }
            Err(HeaderError::Read(err)) => {
                self.raise_error(
                    format!("failed to open content blocking profile file: {err}"),
                    ProfileError::Read,
                );
            }
        }
    }

    /// Build the trie by streaming the profile file through the parser.
    ///
    /// An empty subscription with an update URL is scheduled for update
    /// instead and reported as not loaded. An empty trie is valid and
    /// yields pass for every request.
    pub fn load_rules(&mut self) -> bool {
        self.error = ProfileError::None;

        if self.is_empty && self.update_url.is_some() {
            self.update(None);
            return false;
        }

        if self.path.exists() {
            // The header scanner runs as a pre-pass so a file that is not a
            // subscription never produces a trie.
            match header::scan_header_file(&self.path) {
                Ok(_) => {}
                Err(HeaderError::InvalidHeader) => {
                    self.raise_error(
                        "failed to load content blocking profile: invalid header".to_string(),
                        ProfileError::Parse,
                    );
                    return false;
                }
                Err(HeaderError::Read(err)) => {
                    self.raise_error(
                        format!("failed to open content blocking profile file: {err}"),
                        ProfileError::Read,
                    );
                    return false;
                }
            }
        }

        self.was_loaded = true;

        let mut parser = FilterListParser::new(self.settings);

        if let Ok(file) = File::open(&self.path) {
            let mut lines = BufReader::new(file).lines();
            lines.next(); // header

            for line in lines {
                match line {
                    Ok(line) => parser.parse_line(line.trim_end_matches('\r')),
                    Err(_) => break,
                }
            }
        }

        let set = parser.into_filter_set();
        debug!(
            name = %self.name,
            rules = set.trie.rule_count(),
            "content blocking profile loaded"
        );
        self.filters = Some(set);

        true
    }

    /// Drop the filter set.
    ///
    /// Freeing a large trie is handed to a blocking task when a runtime is
    /// present; the old root is unreachable once this returns.
    pub fn clear(&mut self) {
        if !self.was_loaded {
            return;
        }

        if let Some(filters) = self.filters.take() {
            if let Ok(handle) = Handle::try_current() {
                handle.spawn_blocking(move || drop(filters));
            }
        }

        self.was_loaded = false;
    }

    // =========================================================================
    // Matching
    // =========================================================================

    /// Decide whether `request_url`, requested by the page at `base_url`,
    /// should be blocked.
    pub fn check_url(
        &mut self,
        base_url: &str,
        request_url: &str,
        resource_type: ResourceType,
    ) -> CheckResult {
        if !self.was_loaded && !self.load_rules() {
            return CheckResult::default();
        }

        let Some(filters) = &self.filters else {
            return CheckResult::default();
        };

        let ctx = RequestContext::new(base_url, request_url, resource_type);
        UrlMatcher::new(&filters.trie).check_url(&ctx)
    }

    /// Cosmetic selectors applicable to the given host suffixes.
    pub fn cosmetic_filters(
        &mut self,
        domains: &[String],
        domain_only: bool,
    ) -> CosmeticFiltersResult {
        if !self.was_loaded {
            self.load_rules();
        }

        match &self.filters {
            Some(filters) => filters.cosmetic.filters_for(domains, domain_only),
            None => CosmeticFiltersResult::default(),
        }
    }

    // =========================================================================
    // Updating
    // =========================================================================

    /// Kick off an asynchronous update from `url` or the stored update URL.
    ///
    /// Rejected while a fetch is in flight and when invoked from a thread
    /// other than the one that owns the profile.
    pub fn update(&mut self, url: Option<Url>) -> bool {
        if self.fetch_job.is_some() || thread::current().id() != self.owner {
            return false;
        }

        let Some(effective) = url.or_else(|| self.update_url.clone()) else {
            self.raise_error(
                "failed to update content blocking profile, update URL is empty".to_string(),
                ProfileError::Download,
            );
            return false;
        };

        if Handle::try_current().is_err() {
            self.raise_error(
                "failed to update content blocking profile: no async runtime".to_string(),
                ProfileError::Download,
            );
            return false;
        }

        self.fetch_job = Some(DataFetchJob::start(effective));
        self.notify_modified();
        self.notify_progress();

        true
    }

    /// Progress of the active download in `0..=100`, or `-1` when no fetch
    /// is running.
    pub fn update_progress(&self) -> i32 {
        self.fetch_job.as_ref().map_or(-1, DataFetchJob::progress)
    }

    /// Poll the in-flight update without blocking; true when a completion
    /// was processed by this call. Pushes download progress to the
    /// registered progress observer along the way.
    pub fn poll_update(&mut self) -> bool {
        if self.fetch_job.is_none() {
            return false;
        }

        self.notify_progress();

        let Some(result) = self.fetch_job.as_mut().and_then(DataFetchJob::try_finish) else {
            return false;
        };

        self.fetch_job = None;
        self.notify_progress();
        self.handle_job_finished(result);
        true
    }

    /// Drive the in-flight update to completion; true when the profile was
    /// updated without errors.
    pub async fn finish_update(&mut self) -> bool {
        let Some(job) = self.fetch_job.take() else {
            return false;
        };

        let result = job.finish().await;
        self.notify_progress();
        self.handle_job_finished(result);
        self.error == ProfileError::None
    }

    fn handle_job_finished(&mut self, result: Result<String, FetchError>) {
        match result {
            Ok(body) => self.apply_update_payload(&body),
            Err(err) => self.raise_error(
                format!("failed to update content blocking profile: {err}"),
                ProfileError::Download,
            ),
        }
    }

    /// Validate, canonicalize and commit a downloaded subscription body,
    /// then reload if the profile had been loaded before.
    fn apply_update_payload(&mut self, body: &str) {
        let header_line = body.lines().next().unwrap_or("");
        if !header::contains_header_marker(header_line) {
            self.raise_error(
                "failed to update content blocking profile: invalid header".to_string(),
                ProfileError::Parse,
            );
            return;
        }

        let list = checksum::canonicalize(body);
        if !checksum::verify(&list) {
            self.raise_error(
                "failed to update content blocking profile: checksum mismatch".to_string(),
                ProfileError::Checksum,
            );
            return;
        }

        if let Err(err) = self.commit_payload(&list.data) {
            self.raise_error(
                format!("failed to update content blocking profile: {err}"),
                ProfileError::Download,
            );
            return;
        }

        self.last_update = Some(Utc::now());

        let was_loaded = self.was_loaded;
        self.clear();
        self.load_header();
        if was_loaded {
            self.load_rules();
        }

        self.notify_modified();
    }

    /// Stage the canonical buffer in a temporary file and commit it with a
    /// rename, so a failed update never clobbers the previous list.
    fn commit_payload(&self, data: &str) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) => parent,
            None => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(data.as_bytes())?;
        staged.write_all(b"\n")?;
        staged.persist(&self.path).map_err(|err| err.error)?;

        Ok(())
    }

    /// True when an update URL is set and the interval has elapsed since
    /// the last successful update.
    pub fn is_update_due(&self) -> bool {
        if self.update_url.is_none() || self.update_interval <= 0 {
            return false;
        }

        match self.last_update {
            Some(last) => Utc::now() - last > Duration::days(self.update_interval),
            None => true,
        }
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Cancel any in-flight update and delete the cached subscription file.
    pub fn remove(&mut self) -> bool {
        if let Some(mut job) = self.fetch_job.take() {
            job.cancel();
            self.notify_progress();
        }

        if !self.path.exists() {
            return true;
        }

        match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(err) => {
                self.console.add_message(
                    &format!("failed to remove content blocking profile: {err}"),
                    MessageCategory::ContentBlocking,
                    MessageLevel::Error,
                    Some(&self.path),
                );
                false
            }
        }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Write a fresh profile file under `<data_dir>/contentBlocking/`,
    /// optionally seeded with rules. Refuses to overwrite an existing file
    /// unless asked to.
    pub fn create(
        name: &str,
        title: &str,
        data_dir: &Path,
        seed_rules: Option<&str>,
        can_overwrite: bool,
        console: &dyn ConsoleSink,
    ) -> bool {
        let dir = data_dir.join(PROFILES_DIR);
        let path = dir.join(format!("{name}.txt"));

        if !can_overwrite && path.exists() {
            console.add_message(
                "failed to create a content blocking profile: file already exists",
                MessageCategory::ContentBlocking,
                MessageLevel::Error,
                Some(&path),
            );
            return false;
        }

        let write = || -> std::io::Result<()> {
            fs::create_dir_all(&dir)?;

            let mut file = File::create(&path)?;
            writeln!(file, "[AdBlock Plus 2.0]")?;
            writeln!(file, "! Title: {title}")?;
            if let Some(rules) = seed_rules {
                file.write_all(rules.as_bytes())?;
            }
            Ok(())
        };

        match write() {
            Ok(()) => true,
            Err(err) => {
                console.add_message(
                    &format!("failed to create a content blocking profile: {err}"),
                    MessageCategory::ContentBlocking,
                    MessageLevel::Error,
                    Some(&path),
                );
                false
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn notify_modified(&self) {
        if let Some(handler) = &self.on_modified {
            handler();
        }
    }

    /// Push the current download percentage to the progress observer when
    /// it moved since the last report.
    fn notify_progress(&mut self) {
        let progress = self.update_progress();
        if progress == self.reported_progress {
            return;
        }

        self.reported_progress = progress;
        if let Some(handler) = &self.on_progress {
            handler(progress);
        }
    }

    fn raise_error(&mut self, message: String, error: ProfileError) {
        self.error = error;
        self.console.add_message(
            &message,
            MessageCategory::ContentBlocking,
            MessageLevel::Error,
            Some(&self.path),
        );
        self.notify_modified();
    }
}

impl fmt::Debug for FilterProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterProfile")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("path", &self.path)
            .field("error", &self.error)
            .field("is_empty", &self.is_empty)
            .field("was_loaded", &self.was_loaded)
            .field("is_updating", &self.fetch_job.is_some())
            .finish_non_exhaustive()
    }
}
