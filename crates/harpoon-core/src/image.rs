//! Normalization of merged image definitions into `ImageSpec`s.
//!
//! The merged configuration is loosely typed. Everything an image build
//! needs is checked here, once, so that later stages work with plain typed
//! values and never consult the configuration again.

use crate::context::ContextEntry;
use crate::error::SpecValidationError;
use crate::instruction::{DockerFile, Instruction};
use harpoon_config::{
    ConfigValue, ConfigValueKind, Deferred, IMAGES_FROM, MergeTree, MtimeAccessor,
    TimestampUnavailable,
};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::path::{Path, PathBuf};
use yaml_rust2::Yaml;

/// Options an image definition may carry.
pub const IMAGE_KEYS: &[&str] = &[
    "commands",
    "context",
    "image_name",
    "image_index",
    "tag",
    "description",
    "mtime",
    "config_root",
    IMAGES_FROM,
];

/// Options of the `context` mapping.
pub const CONTEXT_KEYS: &[&str] = &[
    "enabled",
    "parent_dir",
    "include",
    "exclude",
    "use_git",
    "use_gitignore",
    "use_git_timestamps",
];

/// File mode of inline `ADD` content when none is given.
pub const DEFAULT_CONTENT_MODE: u32 = 0o644;

/// Which files of the context directory go into the build context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextOptions {
    pub enabled: bool,
    /// Directory walked for context files
    pub parent_dir: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub use_git: bool,
    /// Leave out files git ignores
    pub use_gitignore: bool,
    /// Stamp unmodified files with their commit time
    pub use_git_timestamps: bool,
}

impl ContextOptions {
    /// Everything under `parent_dir`, without git.
    pub fn new(parent_dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            parent_dir: parent_dir.into(),
            include: Vec::new(),
            exclude: Vec::new(),
            use_git: false,
            use_gitignore: false,
            use_git_timestamps: false,
        }
    }

    /// No files from disk at all.
    pub fn disabled(parent_dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: false,
            ..Self::new(parent_dir)
        }
    }
}

/// Where an image's build timestamp comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildTime {
    /// Written in the configuration
    Fixed(i64),
    /// The timestamp of the document the image was declared in
    Document(MtimeAccessor),
    /// Nothing known; archives use the epoch
    Unknown,
}

impl BuildTime {
    pub fn resolve(&self, use_git: bool) -> Result<i64, TimestampUnavailable> {
        match self {
            BuildTime::Fixed(mtime) => Ok(*mtime),
            BuildTime::Document(accessor) => accessor.resolve(use_git),
            BuildTime::Unknown => Ok(0),
        }
    }
}

/// A validated, buildable image.
#[derive(Debug, Clone, Serialize)]
pub struct ImageSpec {
    /// Key of the image under `images`
    pub name: String,
    /// Full reference the image is built as
    pub image_reference: String,
    pub description: Option<String>,
    pub instructions: Vec<Instruction>,
    pub context: ContextOptions,
    #[serde(skip)]
    pub mtime: BuildTime,
    /// Images referenced by the instructions, in order of first use
    pub dependencies: Vec<String>,
    /// Context files generated from inline `ADD` content
    #[serde(skip)]
    pub extra_context: Vec<ContextEntry>,
    pub config_root: PathBuf,
}

impl ImageSpec {
    /// The Dockerfile synthesized from the instructions.
    pub fn docker_file(&self) -> DockerFile {
        DockerFile::from_instructions(&self.instructions, None)
    }

    pub fn depends_on(&self, image: &str) -> bool {
        self.dependencies.iter().any(|d| d == image)
    }
}

/// The declared images of one merged configuration.
///
/// Normalizing an image needs the other declarations: references are
/// checked against them and rendered with their full names.
#[derive(Debug, Clone)]
pub struct ImageCatalog {
    images: IndexMap<String, ConfigValue>,
    config_root: PathBuf,
    mtime: Option<ConfigValue>,
}

impl ImageCatalog {
    pub fn new(images: IndexMap<String, ConfigValue>) -> Self {
        Self {
            images,
            config_root: PathBuf::from("."),
            mtime: None,
        }
    }

    /// The `images` section of a collected configuration.
    ///
    /// The root document's `config_root` and `mtime` are used for images
    /// that do not carry their own.
    pub fn from_tree(tree: &MergeTree) -> Self {
        let images = tree
            .get(&["images"])
            .and_then(|images| images.as_map().cloned())
            .unwrap_or_default();
        let config_root = tree
            .get_str(&["config_root"])
            .map_or_else(|| PathBuf::from("."), PathBuf::from);
        Self {
            images,
            config_root,
            mtime: tree.get(&["mtime"]),
        }
    }

    pub fn with_config_root(mut self, config_root: impl Into<PathBuf>) -> Self {
        self.config_root = config_root.into();
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.images.get(name)
    }

    /// Full reference of a declared image: `image_index`, `image_name`
    /// (the declaration's key by default) and `:tag` when a tag is set.
    pub fn reference(&self, name: &str) -> Option<String> {
        let image = self.images.get(name)?;
        let text = |key: &str| image.get(key).and_then(|v| v.as_str());

        let mut reference = format!(
            "{}{}",
            text("image_index").unwrap_or(""),
            text("image_name").unwrap_or(name)
        );
        if let Some(tag) = text("tag") {
            reference.push(':');
            reference.push_str(tag);
        }
        Some(reference)
    }

    /// Normalize the declared image `name`.
    pub fn normalize(&self, name: &str) -> Result<ImageSpec, SpecValidationError> {
        let subtree = self
            .images
            .get(name)
            .ok_or_else(|| SpecValidationError::new(name, "images", "is not declared"))?;
        normalize(name, subtree, self)
    }
}

/// Validate the merged definition of image `name`.
pub fn normalize(
    name: &str,
    subtree: &ConfigValue,
    catalog: &ImageCatalog,
) -> Result<ImageSpec, SpecValidationError> {
    let check = Checker { image: name };
    let Some(options) = subtree.as_map() else {
        return Err(check.invalid(
            "definition",
            format!("must be a mapping, found a {}", subtree.kind_name()),
        ));
    };

    if let Some(unknown) = options.keys().find(|k| !IMAGE_KEYS.contains(&k.as_str())) {
        return Err(check.invalid(unknown, "is not a recognized option"));
    }

    let config_root = match options.get("config_root") {
        Some(value) => PathBuf::from(check.string("config_root", value)?),
        None => catalog.config_root.clone(),
    };

    let text_option = |key: &str| -> Result<Option<String>, SpecValidationError> {
        options.get(key).map(|v| check.string(key, v)).transpose()
    };
    let image_name = text_option("image_name")?.unwrap_or_else(|| name.to_string());
    let image_index = text_option("image_index")?.unwrap_or_default();
    let tag = text_option("tag")?;
    let description = text_option("description")?;

    let mut image_reference = format!("{}{}", image_index, image_name);
    if let Some(tag) = &tag {
        image_reference.push(':');
        image_reference.push_str(tag);
    }

    let mtime = match options.get("mtime").or(catalog.mtime.as_ref()) {
        None => BuildTime::Unknown,
        Some(value) => check.build_time(value)?,
    };

    let context = match options.get("context") {
        Some(value) => check.context(value, &config_root)?,
        None => ContextOptions::new(&config_root),
    };

    let commands = options
        .get("commands")
        .ok_or_else(|| check.invalid("commands", "is required"))?;
    let (instructions, extra_context) = check.commands(commands, catalog)?;

    let dependencies: IndexSet<&str> = instructions.iter().filter_map(Instruction::dependency).collect();
    let dependencies = dependencies.into_iter().map(str::to_string).collect();

    tracing::debug!(image = name, reference = %image_reference, "Normalized image");

    Ok(ImageSpec {
        name: name.to_string(),
        image_reference,
        description,
        instructions,
        context,
        mtime,
        dependencies,
        extra_context,
        config_root,
    })
}

/// Builds validation errors for one image.
struct Checker<'a> {
    image: &'a str,
}

impl Checker<'_> {
    fn invalid(&self, field: impl Into<String>, reason: impl Into<String>) -> SpecValidationError {
        SpecValidationError::new(self.image, field, reason)
    }

    fn string(&self, field: &str, value: &ConfigValue) -> Result<String, SpecValidationError> {
        match value.as_yaml() {
            Some(Yaml::String(s)) => Ok(s.clone()),
            _ => Err(self.invalid(field, format!("must be a string, found a {}", value.kind_name()))),
        }
    }

    fn boolean(&self, field: &str, value: &ConfigValue) -> Result<bool, SpecValidationError> {
        value
            .as_bool()
            .ok_or_else(|| self.invalid(field, format!("must be a boolean, found a {}", value.kind_name())))
    }

    fn strings(&self, field: &str, value: &ConfigValue) -> Result<Vec<String>, SpecValidationError> {
        match &value.value {
            ConfigValueKind::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.string(&format!("{}[{}]", field, i), item))
                .collect(),
            _ => Ok(vec![self.string(field, value)?]),
        }
    }

    fn build_time(&self, value: &ConfigValue) -> Result<BuildTime, SpecValidationError> {
        if let Some(mtime) = value.as_i64() {
            return Ok(BuildTime::Fixed(mtime));
        }
        match value.as_deferred() {
            Some(Deferred::Mtime(accessor)) => Ok(BuildTime::Document(accessor.clone())),
            _ => Err(self.invalid(
                "mtime",
                format!("must be an integer, found a {}", value.kind_name()),
            )),
        }
    }

    fn context(&self, value: &ConfigValue, config_root: &Path) -> Result<ContextOptions, SpecValidationError> {
        if let Some(enabled) = value.as_bool() {
            return Ok(if enabled {
                ContextOptions::new(config_root)
            } else {
                ContextOptions::disabled(config_root)
            });
        }
        let Some(options) = value.as_map() else {
            return Err(self.invalid(
                "context",
                format!("must be a boolean or a mapping, found a {}", value.kind_name()),
            ));
        };

        if let Some(unknown) = options.keys().find(|k| !CONTEXT_KEYS.contains(&k.as_str())) {
            return Err(self.invalid(format!("context.{}", unknown), "is not a recognized option"));
        }

        let flag = |key: &str| -> Result<bool, SpecValidationError> {
            options
                .get(key)
                .map_or(Ok(false), |v| self.boolean(&format!("context.{}", key), v))
        };

        let enabled = match options.get("enabled") {
            Some(v) => self.boolean("context.enabled", v)?,
            None => true,
        };
        if !enabled && options.len() > 1 {
            return Err(self.invalid(
                "context.enabled",
                "is false but other context options are set",
            ));
        }

        let parent_dir = match options.get("parent_dir") {
            Some(v) => config_root.join(self.string("context.parent_dir", v)?),
            None => config_root.to_path_buf(),
        };
        let include = match options.get("include") {
            Some(v) => self.strings("context.include", v)?,
            None => Vec::new(),
        };
        let exclude = match options.get("exclude") {
            Some(v) => self.strings("context.exclude", v)?,
            None => Vec::new(),
        };

        let use_git = flag("use_git")?;
        let use_gitignore = flag("use_gitignore")?;
        let use_git_timestamps = flag("use_git_timestamps")?;
        for (set, key) in [
            (use_gitignore, "context.use_gitignore"),
            (use_git_timestamps, "context.use_git_timestamps"),
        ] {
            if set && !use_git {
                return Err(self.invalid(key, "requires use_git"));
            }
        }

        Ok(ContextOptions {
            enabled,
            parent_dir,
            include,
            exclude,
            use_git,
            use_gitignore,
            use_git_timestamps,
        })
    }

    fn commands(
        &self,
        value: &ConfigValue,
        catalog: &ImageCatalog,
    ) -> Result<(Vec<Instruction>, Vec<ContextEntry>), SpecValidationError> {
        let items: Vec<&ConfigValue> = match &value.value {
            ConfigValueKind::Scalar(Yaml::String(line)) if !line.trim().is_empty() => vec![value],
            ConfigValueKind::Array(items) => items.iter().collect(),
            ConfigValueKind::Scalar(Yaml::String(_)) => vec![],
            _ => {
                return Err(self.invalid(
                    "commands",
                    format!("must be a string or a sequence, found a {}", value.kind_name()),
                ));
            }
        };
        if items.is_empty() {
            return Err(self.invalid("commands", "must not be empty"));
        }

        let mut instructions = Vec::with_capacity(items.len());
        let mut extra_context = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            let field = format!("commands[{}]", index);
            instructions.extend(self.command(&field, index, item, catalog, &mut extra_context)?);
        }
        Ok((instructions, extra_context))
    }

    fn command(
        &self,
        field: &str,
        index: usize,
        item: &ConfigValue,
        catalog: &ImageCatalog,
        extra_context: &mut Vec<ContextEntry>,
    ) -> Result<Vec<Instruction>, SpecValidationError> {
        match &item.value {
            ConfigValueKind::Scalar(Yaml::String(line)) => Ok(vec![Instruction::literal(line.clone())]),
            ConfigValueKind::Map(_) => {
                let image = self.image_option(field, item)?;
                Ok(vec![self.reference(field, "FROM", image, catalog)?])
            }
            ConfigValueKind::Array(parts) => {
                let [instruction, argument] = parts.as_slice() else {
                    return Err(self.invalid(
                        field,
                        format!("must have an instruction and an argument, found {} items", parts.len()),
                    ));
                };
                let instruction = self.string(field, instruction)?;
                self.argument(field, index, &instruction, argument, catalog, extra_context)
            }
            _ => Err(self.invalid(
                field,
                format!("must be a string, a sequence or a mapping, found a {}", item.kind_name()),
            )),
        }
    }

    fn argument(
        &self,
        field: &str,
        index: usize,
        instruction: &str,
        argument: &ConfigValue,
        catalog: &ImageCatalog,
        extra_context: &mut Vec<ContextEntry>,
    ) -> Result<Vec<Instruction>, SpecValidationError> {
        match &argument.value {
            ConfigValueKind::Scalar(Yaml::String(text)) => match image_placeholder(text) {
                Some(image) => Ok(vec![self.reference(field, instruction, image, catalog)?]),
                None => Ok(vec![Instruction::literal(format!("{} {}", instruction, text))]),
            },
            ConfigValueKind::Array(_) => Ok(self
                .strings(field, argument)?
                .iter()
                .map(|a| Instruction::literal(format!("{} {}", instruction, a)))
                .collect()),
            ConfigValueKind::Map(options) if options.contains_key("image") => {
                let image = self.image_option(field, argument)?;
                Ok(vec![self.reference(field, instruction, image, catalog)?])
            }
            ConfigValueKind::Map(_) if instruction == "ADD" => {
                let (name, dest, entry) = self.add_content(field, index, argument)?;
                extra_context.push(entry);
                Ok(vec![Instruction::AddContent { name, dest }])
            }
            _ => Err(self.invalid(
                field,
                format!("has an unsupported {} argument", argument.kind_name()),
            )),
        }
    }

    fn image_option<'v>(&self, field: &str, value: &'v ConfigValue) -> Result<&'v str, SpecValidationError> {
        let Some(options) = value.as_map() else {
            return Err(self.invalid(field, "must be a mapping"));
        };
        if let Some(unknown) = options.keys().find(|k| k.as_str() != "image") {
            return Err(self.invalid(format!("{}.{}", field, unknown), "is not a recognized option"));
        }
        options
            .get("image")
            .and_then(|v| v.as_str())
            .ok_or_else(|| self.invalid(format!("{}.image", field), "must name an image"))
    }

    fn reference(
        &self,
        field: &str,
        instruction: &str,
        image: &str,
        catalog: &ImageCatalog,
    ) -> Result<Instruction, SpecValidationError> {
        let reference = catalog
            .reference(image)
            .ok_or_else(|| self.invalid(field, format!("references undeclared image '{}'", image)))?;
        Ok(Instruction::ImageReference {
            instruction: instruction.to_string(),
            image: image.to_string(),
            reference,
        })
    }

    fn add_content(
        &self,
        field: &str,
        index: usize,
        value: &ConfigValue,
    ) -> Result<(String, String, ContextEntry), SpecValidationError> {
        let Some(options) = value.as_map() else {
            return Err(self.invalid(field, "must be a mapping"));
        };
        if let Some(unknown) = options
            .keys()
            .find(|k| !["content", "dest", "mode"].contains(&k.as_str()))
        {
            return Err(self.invalid(format!("{}.{}", field, unknown), "is not a recognized option"));
        }

        let required = |key: &str| {
            options
                .get(key)
                .ok_or_else(|| self.invalid(format!("{}.{}", field, key), "is required"))
                .and_then(|v| self.string(&format!("{}.{}", field, key), v))
        };
        let content = required("content")?;
        let dest = required("dest")?;
        let mode = match options.get("mode") {
            None => DEFAULT_CONTENT_MODE,
            Some(v) => v
                .as_i64()
                .and_then(|m| u32::try_from(m).ok())
                .ok_or_else(|| self.invalid(format!("{}.mode", field), "must be a file mode"))?,
        };

        let name = format!("__harpoon_add_{}", index);
        let entry = ContextEntry::new(name.clone(), content.into_bytes()).with_mode(mode);
        Ok((name, dest, entry))
    }
}

/// The image named by a `{images.NAME}` placeholder.
fn image_placeholder(text: &str) -> Option<&str> {
    let name = text.strip_prefix("{images.")?.strip_suffix('}')?;
    (!name.is_empty() && !name.contains(['.', '{', '}'])).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harpoon_config::load;

    fn catalog_from(text: &str) -> ImageCatalog {
        let value = load(text, "harpoon.yml").unwrap();
        let images = value
            .get("images")
            .and_then(|v| v.as_map())
            .cloned()
            .unwrap();
        ImageCatalog::new(images).with_config_root("/project")
    }

    #[test]
    fn test_two_literal_instructions() {
        let catalog = catalog_from("images:\n  x:\n    commands: [\"FROM base:1.0\", \"RUN echo hi\"]\n");
        let spec = catalog.normalize("x").unwrap();
        assert_eq!(
            spec.instructions,
            vec![
                Instruction::literal("FROM base:1.0"),
                Instruction::literal("RUN echo hi")
            ]
        );
        assert!(spec.dependencies.is_empty());
        assert_eq!(spec.image_reference, "x");
        assert_eq!(spec.context, ContextOptions::new("/project"));
        assert_eq!(spec.mtime, BuildTime::Unknown);
    }

    #[test]
    fn test_single_string_commands() {
        let catalog = catalog_from("images:\n  x:\n    commands: FROM ubuntu:14.04\n");
        let spec = catalog.normalize("x").unwrap();
        assert_eq!(spec.docker_file().lines, vec!["FROM ubuntu:14.04"]);
    }

    #[test]
    fn test_command_forms() {
        let catalog = catalog_from(concat!(
            "images:\n",
            "  base:\n",
            "    commands: FROM scratch\n",
            "    image_index: registry.example.com/\n",
            "    tag: \"1.0\"\n",
            "  app:\n",
            "    commands:\n",
            "      - image: base\n",
            "      - [ENV, \"A=1\"]\n",
            "      - [RUN, [make, make install]]\n",
            "      - [COPY, \"{images.base}\"]\n",
            "      - [FROM, {image: base}]\n",
            "      - [ADD, {content: hello, dest: /etc/motd, mode: 0o600}]\n",
        ));
        let spec = catalog.normalize("app").unwrap();
        let lines = spec.docker_file().lines;
        assert_eq!(
            lines,
            vec![
                "FROM registry.example.com/base:1.0",
                "ENV A=1",
                "RUN make",
                "RUN make install",
                "COPY registry.example.com/base:1.0",
                "FROM registry.example.com/base:1.0",
                "ADD __harpoon_add_5 /etc/motd",
            ]
        );
        assert_eq!(spec.dependencies, vec!["base"]);
        assert!(spec.depends_on("base"));
        assert_eq!(spec.extra_context.len(), 1);
        assert_eq!(spec.extra_context[0].path, "__harpoon_add_5");
        assert_eq!(spec.extra_context[0].content, b"hello");
        assert_eq!(spec.extra_context[0].mode, 0o600);
    }

    #[test]
    fn test_undeclared_reference() {
        let catalog = catalog_from("images:\n  x:\n    commands:\n      - image: nope\n");
        let err = catalog.normalize("x").unwrap_err();
        assert_eq!(err.image, "x");
        assert_eq!(err.field, "commands[0]");
        assert!(err.reason.contains("undeclared image 'nope'"));

        let catalog = catalog_from("images:\n  x:\n    commands:\n      - [FROM, \"{images.nope}\"]\n");
        assert!(catalog.normalize("x").is_err());
    }

    #[test]
    fn test_missing_and_empty_commands() {
        let catalog = catalog_from(concat!(
            "images:\n",
            "  none:\n    tag: \"1\"\n",
            "  blank:\n    commands: \"\"\n",
            "  empty:\n    commands: []\n",
            "  number:\n    commands: 3\n",
        ));
        assert_eq!(catalog.normalize("none").unwrap_err().reason, "is required");
        assert_eq!(catalog.normalize("blank").unwrap_err().reason, "must not be empty");
        assert_eq!(catalog.normalize("empty").unwrap_err().reason, "must not be empty");
        assert_eq!(catalog.normalize("number").unwrap_err().field, "commands");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let catalog = catalog_from(concat!(
            "images:\n",
            "  typo:\n    commands: FROM a\n    comands: FROM b\n",
            "  ctx:\n    commands: FROM a\n    context: {exlude: [a]}\n",
        ));
        let err = catalog.normalize("typo").unwrap_err();
        assert_eq!(err.field, "comands");
        let err = catalog.normalize("ctx").unwrap_err();
        assert_eq!(err.field, "context.exlude");
    }

    #[test]
    fn test_scalar_types_are_checked() {
        let catalog = catalog_from(concat!(
            "images:\n",
            "  tag:\n    commands: FROM a\n    tag: 1.0\n",
            "  flag:\n    commands: FROM a\n    context: {use_git: \"yes\"}\n",
            "  mtime:\n    commands: FROM a\n    mtime: yesterday\n",
        ));
        let err = catalog.normalize("tag").unwrap_err();
        assert_eq!(err.field, "tag");
        assert_eq!(err.reason, "must be a string, found a float");
        assert_eq!(catalog.normalize("flag").unwrap_err().field, "context.use_git");
        assert_eq!(catalog.normalize("mtime").unwrap_err().field, "mtime");
    }

    #[test]
    fn test_conflicting_context_options() {
        let catalog = catalog_from(concat!(
            "images:\n",
            "  off:\n    commands: FROM a\n    context: {enabled: false, include: [a]}\n",
            "  ignore:\n    commands: FROM a\n    context: {use_gitignore: true}\n",
            "  stamps:\n    commands: FROM a\n    context: {use_git_timestamps: true, use_git: false}\n",
        ));
        assert_eq!(catalog.normalize("off").unwrap_err().field, "context.enabled");
        assert_eq!(catalog.normalize("ignore").unwrap_err().field, "context.use_gitignore");
        assert_eq!(
            catalog.normalize("stamps").unwrap_err().field,
            "context.use_git_timestamps"
        );
    }

    #[test]
    fn test_context_options() {
        let catalog = catalog_from(concat!(
            "images:\n",
            "  x:\n",
            "    commands: FROM a\n",
            "    mtime: 42\n",
            "    context:\n",
            "      parent_dir: src\n",
            "      include: \"*.rs\"\n",
            "      exclude: [target]\n",
            "      use_git: true\n",
            "      use_gitignore: true\n",
            "  y:\n    commands: FROM a\n    context: false\n",
        ));
        let x = catalog.normalize("x").unwrap();
        assert_eq!(x.mtime, BuildTime::Fixed(42));
        assert_eq!(x.context.parent_dir, PathBuf::from("/project/src"));
        assert_eq!(x.context.include, vec!["*.rs"]);
        assert_eq!(x.context.exclude, vec!["target"]);
        assert!(x.context.use_git && x.context.use_gitignore);
        assert!(!x.context.use_git_timestamps);

        let y = catalog.normalize("y").unwrap();
        assert!(!y.context.enabled);
    }

    #[test]
    fn test_full_reference() {
        let catalog = catalog_from(concat!(
            "images:\n",
            "  x:\n    commands: FROM a\n    image_name: web\n    image_index: hub.example.com/team/\n    tag: latest\n",
        ));
        assert_eq!(
            catalog.reference("x").as_deref(),
            Some("hub.example.com/team/web:latest")
        );
        assert_eq!(
            catalog.normalize("x").unwrap().image_reference,
            "hub.example.com/team/web:latest"
        );
        assert_eq!(catalog.reference("missing"), None);
    }

    #[test]
    fn test_image_placeholder() {
        assert_eq!(image_placeholder("{images.base}"), Some("base"));
        assert_eq!(image_placeholder("{images.base.tag}"), None);
        assert_eq!(image_placeholder("images.base"), None);
        assert_eq!(image_placeholder("{images.}"), None);
    }
}
