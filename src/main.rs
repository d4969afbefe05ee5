//! Command-line interface for eudamed-xml

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
use eudamed_xml::batch::{generate_batch, IdentifierBatch, JsonRowsSource, UDI_DI_CODE_PATH};
#[cfg(feature = "cli")]
use eudamed_xml::checksum::{gmn_check_characters, gtin_check_digit, is_valid_gmn, is_valid_gtin14};
#[cfg(feature = "cli")]
use eudamed_xml::device::{DeviceStructure, DEVICE_ROOT};
#[cfg(feature = "cli")]
use eudamed_xml::documents::{Document, WriteOptions};
#[cfg(feature = "cli")]
use eudamed_xml::envelope::{Envelope, EnvelopeSettings};
#[cfg(feature = "cli")]
use eudamed_xml::form::{BuildReport, FormTree, FormTreeBuilder, MapCapture};
#[cfg(feature = "cli")]
use eudamed_xml::limits::Limits;
#[cfg(feature = "cli")]
use eudamed_xml::namespaces::NamespaceTable;
#[cfg(feature = "cli")]
use eudamed_xml::regenerate::{regenerate_file, RegenerateOptions};
#[cfg(feature = "cli")]
use eudamed_xml::schema::{NodeKind, Particle, SchemaModel, SchemaNode};
#[cfg(feature = "cli")]
use eudamed_xml::serializer::XmlSerializer;
#[cfg(feature = "cli")]
use eudamed_xml::validation::{report_validation, XmllintValidator};
#[cfg(feature = "cli")]
use eudamed_xml::visibility::VisibilityConfig;

#[cfg(feature = "cli")]
type CliResult = Result<(), Box<dyn std::error::Error>>;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "eudamed-xml")]
#[command(author, version, about = "EUDAMED device registration XML tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute or verify GS1 check characters
    Check {
        #[command(subcommand)]
        kind: CheckKind,
    },

    /// Print the field path tree of a schema root element
    Inspect {
        /// Path to the XSD schema file
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,

        /// Root element name
        #[arg(short, long, default_value = DEVICE_ROOT)]
        root: String,

        /// Stop below this depth
        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// Generate a device document from a schema, a configuration and captured values
    Generate {
        /// Path to the XSD schema file
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,

        #[command(flatten)]
        input: GenerateInput,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the export records as JSON
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Generate one device document per identifier row
    Bulk {
        /// Path to the XSD schema file
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,

        #[command(flatten)]
        input: GenerateInput,

        /// JSON array of identifier rows
        #[arg(long, value_name = "FILE")]
        rows: PathBuf,

        /// Path of the UDI-DI code inside the device tree
        #[arg(long, default_value = UDI_DI_CODE_PATH)]
        udi_path: String,

        /// Directory receiving one document per row
        #[arg(short, long)]
        output_dir: PathBuf,
    },

    /// Regenerate the identifiers of an existing device document
    Regenerate {
        /// Document to regenerate
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// New document to write
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// GS1 company prefix of the Basic UDI-DI
        #[arg(long)]
        prefix: Option<String>,

        /// Prefix of the generated GTIN-14 body
        #[arg(long)]
        gtin_prefix: Option<String>,

        /// Suffix used when none can be extracted
        #[arg(long)]
        fallback_suffix: Option<String>,

        /// Reference document to take the suffix from
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Seed for reproducible identifiers
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum CheckKind {
    /// GMN check characters of a Basic UDI-DI
    Gmn {
        /// GMN without check characters, or a full GMN with --verify
        value: String,

        /// Verify a complete GMN instead
        #[arg(long)]
        verify: bool,
    },
    /// GTIN-14 check digit of a UDI-DI
    Gtin {
        /// First 13 digits, or a full GTIN-14 with --verify
        value: String,

        /// Verify a complete GTIN-14 instead
        #[arg(long)]
        verify: bool,
    },
}

#[cfg(feature = "cli")]
#[derive(clap::Args, Debug)]
struct GenerateInput {
    /// Root element name
    #[arg(short, long, default_value = DEVICE_ROOT)]
    root: String,

    /// Visibility configuration file
    #[arg(short, long, conflicts_with_all = ["config_dir", "group"])]
    config: Option<PathBuf>,

    /// Directory of per-group configuration files
    #[arg(long, requires = "group")]
    config_dir: Option<PathBuf>,

    /// Device group name
    #[arg(short, long, requires = "config_dir")]
    group: Option<String>,

    /// JSON file of captured values, choices and counts
    #[arg(long, value_name = "FILE")]
    values: Option<PathBuf>,

    /// Wrap the document in a Push message
    #[arg(long)]
    envelope: bool,

    /// Validate the output with xmllint
    #[arg(long)]
    validate: bool,
}

#[cfg(feature = "cli")]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { kind } => cmd_check(kind),
        Commands::Inspect {
            schema,
            root,
            depth,
        } => cmd_inspect(schema, root, depth),
        Commands::Generate {
            schema,
            input,
            output,
            report,
        } => cmd_generate(schema, input, output, report),
        Commands::Bulk {
            schema,
            input,
            rows,
            udi_path,
            output_dir,
        } => cmd_bulk(schema, input, rows, udi_path, output_dir),
        Commands::Regenerate {
            input,
            output,
            prefix,
            gtin_prefix,
            fallback_suffix,
            reference,
            seed,
        } => cmd_regenerate(input, output, prefix, gtin_prefix, fallback_suffix, reference, seed),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn cmd_check(kind: CheckKind) -> CliResult {
    match kind {
        CheckKind::Gmn { value, verify: true } => print_verdict(is_valid_gmn(&value)),
        CheckKind::Gtin { value, verify: true } => print_verdict(is_valid_gtin14(&value)),
        CheckKind::Gmn { value, .. } => {
            println!("{}{}", value, gmn_check_characters(&value)?);
            Ok(())
        }
        CheckKind::Gtin { value, .. } => {
            println!("{}{}", value, gtin_check_digit(&value)?);
            Ok(())
        }
    }
}

#[cfg(feature = "cli")]
fn print_verdict(valid: bool) -> CliResult {
    if valid {
        println!("valid");
        Ok(())
    } else {
        println!("invalid");
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn cmd_inspect(schema_path: PathBuf, root: String, depth: Option<usize>) -> CliResult {
    let model = SchemaModel::from_file(&schema_path)?;
    let node = model.root(&root)?;

    println!("eudamed-xml v{}", eudamed_xml::VERSION);
    println!("Schema: {}", schema_path.display());
    println!("Global Elements: {}", model.len());
    println!();
    print_node(node, node.local_name(), 0, depth);
    Ok(())
}

#[cfg(feature = "cli")]
fn print_node(node: &SchemaNode, path: &str, level: usize, max_depth: Option<usize>) {
    let indent = "  ".repeat(level);
    match &node.kind {
        NodeKind::Simple(facets) => {
            let summary = facets.constraint_summary();
            if summary.is_empty() {
                println!("{}{} [{}]", indent, path, node.occurs);
            } else {
                println!("{}{} [{}] {}", indent, path, node.occurs, summary);
            }
        }
        NodeKind::Complex(content) => {
            let type_str = node
                .type_name
                .as_ref()
                .map(|t| t.local_name.clone())
                .unwrap_or_else(|| "anonymous".to_string());
            println!("{}{} [{}] : {}", indent, path, node.occurs, type_str);
            if max_depth.is_some_and(|max| level >= max) {
                return;
            }
            if let Some(group) = content {
                print_particles(&group.particles, path, level + 1, max_depth);
            }
        }
    }
}

#[cfg(feature = "cli")]
fn print_particles(particles: &[Particle], path: &str, level: usize, max_depth: Option<usize>) {
    for particle in particles {
        match particle {
            Particle::Element(child) => {
                let child_path = format!("{}/{}", path, child.local_name());
                print_node(child, &child_path, level, max_depth);
            }
            Particle::Group(group) => {
                println!("{}({} [{}])", "  ".repeat(level), group.model, group.occurs);
                print_particles(&group.particles, path, level + 1, max_depth);
            }
        }
    }
}

#[cfg(feature = "cli")]
fn load_config(input: &GenerateInput, limits: &Limits) -> Result<VisibilityConfig, Box<dyn std::error::Error>> {
    if let Some(path) = &input.config {
        return Ok(VisibilityConfig::from_file(path, limits)?);
    }
    if let (Some(dir), Some(group)) = (&input.config_dir, &input.group) {
        if let Some(config) = VisibilityConfig::load_group(dir, group, limits)? {
            return Ok(config);
        }
        log::info!("No configuration for group {}, all fields visible", group);
    }
    Ok(VisibilityConfig::new())
}

#[cfg(feature = "cli")]
fn load_capture(input: &GenerateInput) -> Result<MapCapture, Box<dyn std::error::Error>> {
    match &input.values {
        Some(path) => Ok(MapCapture::from_json_str(&fs::read_to_string(path)?)?),
        None => Ok(MapCapture::new()),
    }
}

#[cfg(feature = "cli")]
fn envelope_settings(input: &GenerateInput, config: &VisibilityConfig) -> Option<EnvelopeSettings> {
    if !input.envelope {
        return None;
    }
    Some(config.envelope.clone().unwrap_or_else(|| {
        log::warn!("No envelope settings configured, sender fields are empty");
        EnvelopeSettings::default()
    }))
}

/// Build the tree of `root`, using the device layout when the root has one
#[cfg(feature = "cli")]
fn collect_tree(
    node: &SchemaNode,
    builder: &FormTreeBuilder<'_>,
    capture: &mut MapCapture,
    report: &mut BuildReport,
) -> eudamed_xml::Result<FormTree> {
    match DeviceStructure::locate_in(node) {
        Ok(structure) => structure.collect(builder, capture, report),
        Err(_) => Ok(builder.build(node, capture, report)?.unwrap_or_else(FormTree::map)),
    }
}

#[cfg(feature = "cli")]
fn to_document(
    node: &SchemaNode,
    serializer: &XmlSerializer<'_>,
    tree: &FormTree,
    envelope: Option<&EnvelopeSettings>,
) -> eudamed_xml::Result<Document> {
    if let Ok(structure) = DeviceStructure::locate_in(node) {
        return structure.to_document(serializer, tree, envelope);
    }
    let tag = node.name.clark();
    match envelope {
        None => Ok(Document::with_root(serializer.serialize(&tag, tree)?)),
        Some(settings) => {
            let payload = serializer.serialize_root(&tag, tree, node.type_name.as_ref())?;
            Ok(Document::with_root(Envelope::new(settings.clone()).wrap(vec![payload])))
        }
    }
}

#[cfg(feature = "cli")]
fn validate_output(schema_path: &Path, xml: &str) {
    report_validation(&XmllintValidator::new(), xml, schema_path);
}

#[cfg(feature = "cli")]
fn cmd_generate(
    schema_path: PathBuf,
    input: GenerateInput,
    output: Option<PathBuf>,
    report_path: Option<PathBuf>,
) -> CliResult {
    let limits = Limits::default();
    let model = SchemaModel::from_file_with_limits(&schema_path, &limits)?;
    let node = model.root(&input.root)?;
    let config = load_config(&input, &limits)?;
    let mut capture = load_capture(&input)?;

    let builder = FormTreeBuilder::new(&config).with_limits(limits.clone());
    let mut report = BuildReport::new();
    let tree = collect_tree(node, &builder, &mut capture, &mut report)?;

    let table = NamespaceTable::from_schema(&model);
    let serializer = XmlSerializer::new(&table);
    let envelope = envelope_settings(&input, &config);
    let doc = to_document(node, &serializer, &tree, envelope.as_ref())?;
    let xml = doc.to_xml_string(&WriteOptions::default())?;

    for error in report.field_errors() {
        eprintln!("{}", error);
    }
    if input.validate {
        validate_output(&schema_path, &xml);
    }
    if let Some(path) = report_path {
        fs::write(path, serde_json::to_string_pretty(report.records())?)?;
    }

    match output {
        Some(path) => {
            fs::write(&path, &xml)?;
            log::info!("Wrote {}", path.display());
        }
        None => print!("{}", xml),
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_bulk(
    schema_path: PathBuf,
    input: GenerateInput,
    rows: PathBuf,
    udi_path: String,
    output_dir: PathBuf,
) -> CliResult {
    let limits = Limits::default();
    let model = SchemaModel::from_file_with_limits(&schema_path, &limits)?;
    let node = model.root(&input.root)?;
    let config = load_config(&input, &limits)?;
    let mut capture = load_capture(&input)?;

    let mut source = JsonRowsSource::new(rows).with_limits(limits.clone());
    let batch = IdentifierBatch::fetch(&mut source)?;

    let builder = FormTreeBuilder::new(&config).with_limits(limits);
    let mut report = BuildReport::new();
    let tree = collect_tree(node, &builder, &mut capture, &mut report)?;
    for error in report.field_errors() {
        eprintln!("{}", error);
    }

    let table = NamespaceTable::from_schema(&model);
    let serializer = XmlSerializer::new(&table);
    let envelope = envelope_settings(&input, &config);

    fs::create_dir_all(&output_dir)?;
    for (index, (row, spliced)) in generate_batch(node, &tree, &batch, &udi_path)?.into_iter().enumerate() {
        let doc = to_document(node, &serializer, &spliced, envelope.as_ref())?;
        let xml = doc.to_xml_string(&WriteOptions::default())?;
        if input.validate {
            validate_output(&schema_path, &xml);
        }
        let path = output_dir.join(format!("{:03}_{}.xml", index, row.pcode));
        fs::write(&path, &xml)?;
        println!("{} {}", row.udi_di, path.display());
    }
    Ok(())
}

#[cfg(feature = "cli")]
#[allow(clippy::too_many_arguments)]
fn cmd_regenerate(
    input: PathBuf,
    output: PathBuf,
    prefix: Option<String>,
    gtin_prefix: Option<String>,
    fallback_suffix: Option<String>,
    reference: Option<PathBuf>,
    seed: Option<u64>,
) -> CliResult {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    let mut options = RegenerateOptions::default();
    if let Some(prefix) = prefix {
        options.manufacturer_prefix = prefix;
    }
    if let Some(gtin_prefix) = gtin_prefix {
        options.gtin_prefix = gtin_prefix;
    }
    if let Some(suffix) = fallback_suffix {
        options.fallback_suffix = suffix;
    }
    options.reference = reference;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let result = regenerate_file(&input, &output, &options, &Limits::default(), &mut rng)?;

    println!("Basic UDI-DI: {}", result.basic_udi);
    for udi_di in &result.udi_dis {
        println!("UDI-DI: {}", udi_di);
    }
    if let Some(message_id) = &result.message_id {
        println!("Message ID: {}", message_id);
    }
    println!("Wrote {}", output.display());
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
