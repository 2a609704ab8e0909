/*!
 * XML export writer
 *
 * Renders the resolved file list as a `<code_files>` document: one `<file>`
 * per file with its content in CDATA, or an empty element flagged
 * `truncated`, `binary` or `error` when the content is left out.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use tracing::{debug, warn};

use crate::error::{Result, ResultExt};
use crate::host::FsHost;
use crate::selection::root_of;
use crate::tokenizer::BinaryClassifier;
use crate::types::{EntryKind, WorkspaceRoot};
use crate::utils::relative_slash_path;

/// What goes inside one `<file>` element
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileBody {
    Text(String),
    Truncated,
    Binary,
    Error,
}

#[derive(Debug)]
struct FileRecord {
    name: String,
    rel: String,
    body: FileBody,
}

/// Split `content` into CDATA section bodies so no section contains `]]>`.
///
/// Written back to back the sections read as the original text with every
/// `]]>` turned into `]]]]><![CDATA[>`.
pub fn cdata_sections(content: &str) -> Vec<String> {
    let pieces: Vec<&str> = content.split("]]>").collect();
    let last = pieces.len() - 1;
    pieces
        .iter()
        .enumerate()
        .map(|(i, piece)| {
            let mut section = String::with_capacity(piece.len() + 3);
            if i > 0 {
                section.push('>');
            }
            section.push_str(piece);
            if i < last {
                section.push_str("]]");
            }
            section
        })
        .collect()
}

/// XML writer for selected files
pub struct XmlWriter {
    host: Arc<dyn FsHost>,
    binary: Arc<BinaryClassifier>,
    max_preview_bytes: u64,
}

impl XmlWriter {
    /// Create a new XML writer
    pub fn new(host: Arc<dyn FsHost>, binary: Arc<BinaryClassifier>, max_preview_bytes: u64) -> Self {
        Self {
            host,
            binary,
            max_preview_bytes,
        }
    }

    async fn load(&self, path: &Path) -> FileBody {
        let stat = match self.host.stat(path).await {
            Ok(stat) if stat.kind == EntryKind::File => stat,
            Ok(_) => return FileBody::Error,
            Err(e) => {
                warn!("Error checking {} for export: {}", path.display(), e);
                return FileBody::Error;
            }
        };
        if stat.size > self.max_preview_bytes {
            return FileBody::Truncated;
        }
        if self
            .binary
            .is_binary(self.host.as_ref(), path, stat.mtime)
            .await
        {
            return FileBody::Binary;
        }
        match self.host.read_file(path).await {
            Ok(bytes) => FileBody::Text(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                warn!("Error reading {} for export: {}", path.display(), e);
                FileBody::Error
            }
        }
    }

    /// Render `files` as a `<code_files>` document. Files are sorted by path
    /// and, with more than one root, grouped per workspace root.
    pub async fn render(&self, files: &[PathBuf], roots: &[WorkspaceRoot]) -> Result<String> {
        let mut sorted: Vec<&PathBuf> = files.iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut groups: IndexMap<usize, Vec<FileRecord>> =
            (0..roots.len()).map(|i| (i, Vec::new())).collect();
        for path in sorted {
            let Some(root) = root_of(roots, path) else {
                warn!("{} is outside every workspace root, not exported", path.display());
                continue;
            };
            let Some(index) = roots.iter().position(|r| r == root) else {
                continue;
            };
            let rel = relative_slash_path(&root.path, path).unwrap_or_default();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| rel.clone());
            let body = self.load(path).await;
            if let Some(group) = groups.get_mut(&index) {
                group.push(FileRecord { name, rel, body });
            }
        }

        let multi_root = roots.len() > 1;
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Start(BytesStart::new("code_files")))?;
        for (index, records) in &groups {
            if records.is_empty() {
                continue;
            }
            if multi_root {
                let root = &roots[*index];
                let mut start_tag = BytesStart::new("workspace");
                start_tag.push_attribute(("name", root.name.as_str()));
                start_tag.push_attribute(("path", root.path.to_string_lossy().as_ref()));
                writer.write_event(Event::Start(start_tag))?;
            }
            for record in records {
                Self::write_file(&mut writer, record)?;
            }
            if multi_root {
                writer.write_event(Event::End(BytesEnd::new("workspace")))?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new("code_files")))?;

        let xml = String::from_utf8(writer.into_inner()).with_context(|| "export is not UTF-8")?;
        debug!("Rendered {} bytes of XML", xml.len());
        Ok(xml)
    }

    fn write_file(writer: &mut Writer<Vec<u8>>, record: &FileRecord) -> Result<()> {
        let mut start_tag = BytesStart::new("file");
        start_tag.push_attribute(("name", record.name.as_str()));
        start_tag.push_attribute(("path", record.rel.as_str()));

        match &record.body {
            FileBody::Truncated => {
                start_tag.push_attribute(("truncated", "true"));
                writer.write_event(Event::Empty(start_tag))?;
            }
            FileBody::Binary => {
                start_tag.push_attribute(("binary", "true"));
                writer.write_event(Event::Empty(start_tag))?;
            }
            FileBody::Error => {
                start_tag.push_attribute(("error", "true"));
                writer.write_event(Event::Empty(start_tag))?;
            }
            FileBody::Text(content) => {
                writer.write_event(Event::Start(start_tag))?;
                for section in cdata_sections(content) {
                    writer.write_event(Event::CData(BytesCData::new(section)))?;
                }
                writer.write_event(Event::End(BytesEnd::new("file")))?;
            }
        }
        Ok(())
    }
}
