//! EPUB writer. Accumulates chapters and serializes an EPUB 3 archive
//! (mimetype, container, chapters, OPF, NCX, nav) into memory.

use std::io::{Cursor, Seek, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const CONTAINER_XML: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n  <rootfiles>\n    <rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/>\n  </rootfiles>\n</container>";

const MIMETYPE: &[u8] = b"application/epub+zip";
const OEBPS_PREFIX: &str = "OEBPS/";
const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

/// Manifest ids that are not chapters and never appear in the spine.
const AUX_IDS: [&str; 3] = [PACKAGE_ID, "ncx", "nav"];

/// Tracked in the manifest for bookkeeping but never written as an `<item>`:
/// EPUB 3 forbids the package document from listing itself.
const PACKAGE_ID: &str = "content-opf";

const DEFAULT_IDENTIFIER: &str = "urn:serialepub:book";

/// Errors from building the archive.
#[derive(Debug, Error)]
pub enum EpubError {
    #[error("Cannot write EPUB: book title is empty.")]
    EmptyTitle,

    #[error("Cannot write EPUB: book has no chapters.")]
    NoChapters,

    /// Manifest, spine, and table of contents disagree about the chapter set or order.
    #[error("EPUB structure is inconsistent: {reason}")]
    StructuralInconsistency { reason: String },

    #[error("Failed to write EPUB archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl From<std::io::Error> for EpubError {
    fn from(e: std::io::Error) -> Self {
        EpubError::Zip(zip::result::ZipError::Io(e))
    }
}

#[derive(Debug, Clone)]
struct ManifestItem {
    id: String,
    href: String,
    media_type: &'static str,
    properties: Option<&'static str>,
}

#[derive(Debug, Clone)]
struct NavPoint {
    id: String,
    play_order: u32,
    label: String,
    src: String,
}

#[derive(Debug, Clone)]
struct ChapterDocument {
    number: u32,
    href: String,
    xhtml: String,
}

/// Package under construction. `add_chapter` keeps the chapter documents, manifest,
/// spine, and table of contents in step; `build` re-checks that before writing.
#[derive(Debug)]
pub struct EpubBuilder {
    title: String,
    language: String,
    identifier: String,
    modified: String,
    chapters: Vec<ChapterDocument>,
    manifest: Vec<ManifestItem>,
    spine: Vec<String>,
    toc: Vec<NavPoint>,
}

impl EpubBuilder {
    pub fn new(title: impl Into<String>, language: impl Into<String>) -> Self {
        let manifest = vec![
            ManifestItem {
                id: PACKAGE_ID.to_string(),
                href: "content.opf".to_string(),
                media_type: "application/oebps-package+xml",
                properties: None,
            },
            ManifestItem {
                id: "ncx".to_string(),
                href: "toc.ncx".to_string(),
                media_type: "application/x-dtbncx+xml",
                properties: None,
            },
            ManifestItem {
                id: "nav".to_string(),
                href: "nav.xhtml".to_string(),
                media_type: XHTML_MEDIA_TYPE,
                properties: Some("nav"),
            },
        ];
        Self {
            title: title.into(),
            language: language.into(),
            identifier: DEFAULT_IDENTIFIER.to_string(),
            modified: chrono::Utc::now()
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string(),
            chapters: Vec::new(),
            manifest,
            spine: Vec::new(),
            toc: Vec::new(),
        }
    }

    /// Set `dc:identifier` (e.g. the listing URL).
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Append a chapter. Numbers are expected to be strictly increasing; a violation
    /// is reported by `build`.
    pub fn add_chapter(&mut self, number: u32, title: &str, body: &str) {
        let id = format!("chapter-{}", number);
        let href = format!("chapter-{}.xhtml", number);
        self.chapters.push(ChapterDocument {
            number,
            href: href.clone(),
            xhtml: chapter_xhtml(&self.language, title, body),
        });
        self.manifest.push(ManifestItem {
            id: id.clone(),
            href: href.clone(),
            media_type: XHTML_MEDIA_TYPE,
            properties: None,
        });
        self.spine.push(id.clone());
        self.toc.push(NavPoint {
            id,
            play_order: number,
            label: title.to_string(),
            src: href,
        });
    }

    /// Serialize the archive. Fails without producing output if the package is invalid.
    pub fn build(&self) -> Result<Vec<u8>, EpubError> {
        if self.title.trim().is_empty() {
            return Err(EpubError::EmptyTitle);
        }
        if self.chapters.is_empty() {
            return Err(EpubError::NoChapters);
        }
        self.check_structure()?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        let options_stored = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .unix_permissions(0o644);
        let options_deflate = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(0o644);

        // 1. Mimetype first, uncompressed (required by OCF)
        zip.start_file("mimetype", options_stored)?;
        zip.write_all(MIMETYPE)?;

        // 2. Container
        zip.start_file("META-INF/container.xml", options_deflate)?;
        zip.write_all(CONTAINER_XML)?;

        for chapter in &self.chapters {
            zip.start_file(format!("{}{}", OEBPS_PREFIX, chapter.href), options_deflate)?;
            zip.write_all(chapter.xhtml.as_bytes())?;
        }

        self.write_opf(&mut zip, options_deflate)?;
        self.write_ncx(&mut zip, options_deflate)?;
        self.write_nav_xhtml(&mut zip, options_deflate)?;

        Ok(zip.finish()?.into_inner())
    }

    /// Chapter numbers strictly increasing; manifest chapter ids, spine idrefs, and
    /// TOC entries identical and in the same order.
    fn check_structure(&self) -> Result<(), EpubError> {
        for pair in self.chapters.windows(2) {
            if pair[1].number <= pair[0].number {
                return Err(EpubError::StructuralInconsistency {
                    reason: format!(
                        "chapter {} added after chapter {}",
                        pair[1].number, pair[0].number
                    ),
                });
            }
        }

        let manifest_chapters: Vec<&str> = self
            .manifest
            .iter()
            .map(|item| item.id.as_str())
            .filter(|id| !AUX_IDS.contains(id))
            .collect();
        let spine: Vec<&str> = self.spine.iter().map(String::as_str).collect();
        let toc: Vec<&str> = self.toc.iter().map(|p| p.id.as_str()).collect();
        if manifest_chapters != spine {
            return Err(EpubError::StructuralInconsistency {
                reason: "manifest chapters do not match the spine".to_string(),
            });
        }
        if toc != spine {
            return Err(EpubError::StructuralInconsistency {
                reason: "table of contents does not match the spine".to_string(),
            });
        }
        for (point, chapter) in self.toc.iter().zip(&self.chapters) {
            if point.play_order != chapter.number || point.src != chapter.href {
                return Err(EpubError::StructuralInconsistency {
                    reason: format!("table of contents entry {} is out of step", point.id),
                });
            }
        }
        Ok(())
    }

    fn write_opf(
        &self,
        zip: &mut ZipWriter<impl Write + Seek>,
        options: SimpleFileOptions,
    ) -> Result<(), EpubError> {
        let mut manifest = String::new();
        for item in self.manifest.iter().filter(|item| item.id != PACKAGE_ID) {
            let properties = item
                .properties
                .map(|p| format!(r#" properties="{}""#, p))
                .unwrap_or_default();
            manifest.push_str(&format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"{}/>\n",
                item.id, item.href, item.media_type, properties
            ));
        }
        let mut spine = String::new();
        for idref in &self.spine {
            spine.push_str(&format!("    <itemref idref=\"{}\"/>\n", idref));
        }

        let opf = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="book-id" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">{id}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:language>{language}</dc:language>
    <meta property="dcterms:modified">{modified}</meta>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>
"#,
            id = xml_escape(&self.identifier),
            title = xml_escape(&self.title),
            language = xml_escape(&self.language),
            modified = self.modified,
            manifest = manifest,
            spine = spine,
        );

        zip.start_file(format!("{}content.opf", OEBPS_PREFIX), options)?;
        zip.write_all(opf.as_bytes())?;
        Ok(())
    }

    fn write_ncx(
        &self,
        zip: &mut ZipWriter<impl Write + Seek>,
        options: SimpleFileOptions,
    ) -> Result<(), EpubError> {
        let mut nav_points = String::new();
        for point in &self.toc {
            nav_points.push_str(&format!(
                r#"    <navPoint id="navpoint-{}" playOrder="{}">
      <navLabel><text>{}</text></navLabel>
      <content src="{}"/>
    </navPoint>
"#,
                point.play_order,
                point.play_order,
                xml_escape(&point.label),
                point.src
            ));
        }
        let ncx = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{}"/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle>
    <text>{}</text>
  </docTitle>
  <navMap>
{}  </navMap>
</ncx>
"#,
            xml_escape(&self.identifier),
            xml_escape(&self.title),
            nav_points
        );
        zip.start_file(format!("{}toc.ncx", OEBPS_PREFIX), options)?;
        zip.write_all(ncx.as_bytes())?;
        Ok(())
    }

    fn write_nav_xhtml(
        &self,
        zip: &mut ZipWriter<impl Write + Seek>,
        options: SimpleFileOptions,
    ) -> Result<(), EpubError> {
        let mut nav_links = String::new();
        for point in &self.toc {
            nav_links.push_str(&format!(
                "      <li><a href=\"{}\">{}</a></li>\n",
                point.src,
                xml_escape(&point.label)
            ));
        }
        let nav = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head>
  <meta charset="UTF-8"/>
  <title>Table of Contents</title>
</head>
<body>
  <nav epub:type="toc">
    <h1>{}</h1>
    <ol>
{}    </ol>
  </nav>
</body>
</html>
"#,
            xml_escape(&self.title),
            nav_links
        );
        zip.start_file(format!("{}nav.xhtml", OEBPS_PREFIX), options)?;
        zip.write_all(nav.as_bytes())?;
        Ok(())
    }
}

fn chapter_xhtml(language: &str, title: &str, body: &str) -> String {
    let title = xml_escape(title);
    let language = xml_escape(language);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="{language}" lang="{language}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
</head>
<body>
  <h1>{title}</h1>
{paragraphs}</body>
</html>
"#,
        language = language,
        title = title,
        paragraphs = text_to_paragraphs(body)
    )
}

/// Blank-line separated blocks become `<p>`; single newlines inside a block become `<br/>`.
fn text_to_paragraphs(text: &str) -> String {
    let mut out = String::new();
    for block in text.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        let lines: Vec<String> = block.lines().map(|l| xml_escape(l.trim())).collect();
        out.push_str("  <p>");
        out.push_str(&lines.join("<br/>\n"));
        out.push_str("</p>\n");
    }
    out
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::io::Read;
    use zip::read::ZipArchive;

    fn builder_with(numbers: &[u32]) -> EpubBuilder {
        let mut builder = EpubBuilder::new("Test Novel", "ko");
        for &n in numbers {
            builder.add_chapter(n, &format!("Chapter {}", n), &format!("Body of {}.", n));
        }
        builder
    }

    fn read_entry(zip: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut entry = zip.by_name(name).unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        content
    }

    fn captures(pattern: &str, haystack: &str) -> Vec<String> {
        Regex::new(pattern)
            .unwrap()
            .captures_iter(haystack)
            .map(|c| c[1].to_string())
            .collect()
    }

    #[test]
    fn mimetype_is_first_and_stored() -> Result<(), EpubError> {
        let bytes = builder_with(&[1]).build()?;
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut first = zip.by_index(0)?;
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), zip::CompressionMethod::Stored);
        let mut content = String::new();
        first.read_to_string(&mut content)?;
        assert_eq!(content, "application/epub+zip");
        Ok(())
    }

    #[test]
    fn container_points_at_package_descriptor() -> Result<(), EpubError> {
        let bytes = builder_with(&[1]).build()?;
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let container = read_entry(&mut zip, "META-INF/container.xml");
        assert!(container.contains(r#"full-path="OEBPS/content.opf""#));
        assert!(zip.by_name("OEBPS/content.opf").is_ok());
        Ok(())
    }

    #[test]
    fn entries_follow_package_order() -> Result<(), EpubError> {
        let bytes = builder_with(&[1, 2]).build()?;
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let ordered: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).map(|f| f.name().to_string()))
            .collect::<Result<_, _>>()?;
        assert_eq!(
            ordered,
            vec![
                "mimetype",
                "META-INF/container.xml",
                "OEBPS/chapter-1.xhtml",
                "OEBPS/chapter-2.xhtml",
                "OEBPS/content.opf",
                "OEBPS/toc.ncx",
                "OEBPS/nav.xhtml",
            ]
        );
        Ok(())
    }

    #[test]
    fn manifest_spine_and_toc_agree() -> Result<(), EpubError> {
        let bytes = builder_with(&[1, 2, 5]).build()?;
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let opf = read_entry(&mut zip, "OEBPS/content.opf");
        let ncx = read_entry(&mut zip, "OEBPS/toc.ncx");

        let manifest = captures(r#"<item id="(chapter-\d+)""#, &opf);
        let spine = captures(r#"<itemref idref="([^"]+)""#, &opf);
        let toc = captures(r#"<content src="(chapter-\d+)\.xhtml""#, &ncx);
        assert_eq!(manifest, vec!["chapter-1", "chapter-2", "chapter-5"]);
        assert_eq!(spine, manifest);
        assert_eq!(toc, manifest);

        let aux = captures(r#"<item id="([a-z-]+)""#, &opf);
        assert_eq!(aux, vec!["ncx", "nav"]);

        let play_orders = captures(r#"playOrder="(\d+)""#, &ncx);
        assert_eq!(play_orders, vec!["1", "2", "5"]);
        let labels = captures(r#"<text>(Chapter \d+)</text>"#, &ncx);
        assert_eq!(labels, vec!["Chapter 1", "Chapter 2", "Chapter 5"]);
        Ok(())
    }

    #[test]
    fn package_document_is_tracked_but_not_listed() -> Result<(), EpubError> {
        let builder = builder_with(&[1]);
        assert!(builder.manifest.iter().any(|item| item.id == PACKAGE_ID));

        let bytes = builder.build()?;
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let opf = read_entry(&mut zip, "OEBPS/content.opf");
        assert!(!opf.contains(r#"href="content.opf""#));
        assert!(!opf.contains("application/oebps-package+xml"));
        Ok(())
    }

    #[test]
    fn out_of_order_chapter_is_rejected() {
        let result = builder_with(&[1, 3, 2]).build();
        assert!(matches!(
            result,
            Err(EpubError::StructuralInconsistency { .. })
        ));
    }

    #[test]
    fn duplicate_chapter_number_is_rejected() {
        let result = builder_with(&[1, 2, 2]).build();
        assert!(matches!(
            result,
            Err(EpubError::StructuralInconsistency { .. })
        ));
    }

    #[test]
    fn no_chapters_is_rejected() {
        assert!(matches!(
            builder_with(&[]).build(),
            Err(EpubError::NoChapters)
        ));
    }

    #[test]
    fn empty_title_is_rejected() {
        let mut builder = EpubBuilder::new("  ", "ko");
        builder.add_chapter(1, "Chapter 1", "text");
        assert!(matches!(builder.build(), Err(EpubError::EmptyTitle)));
    }

    #[test]
    fn chapter_document_has_heading_and_escaped_paragraphs() -> Result<(), EpubError> {
        let mut builder = EpubBuilder::new("Tom & Jerry", "ko");
        builder.add_chapter(1, "Chapter 1", "a < b\nsecond line\n\nnext \"para\"");
        let bytes = builder.build()?;
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let xhtml = read_entry(&mut zip, "OEBPS/chapter-1.xhtml");
        assert!(xhtml.contains("<h1>Chapter 1</h1>"));
        assert!(xhtml.contains("<p>a &lt; b<br/>\nsecond line</p>"));
        assert!(xhtml.contains("<p>next &quot;para&quot;</p>"));
        let opf = read_entry(&mut zip, "OEBPS/content.opf");
        assert!(opf.contains("<dc:title>Tom &amp; Jerry</dc:title>"));
        assert!(opf.contains("<dc:language>ko</dc:language>"));
        assert!(opf.contains(r#"properties="nav""#));
        assert!(opf.contains("dcterms:modified"));
        Ok(())
    }

    #[test]
    fn identifier_is_written_to_opf_and_ncx() -> Result<(), EpubError> {
        let mut builder = EpubBuilder::new("T", "ko").identifier("https://booktoki.example/novel/1");
        builder.add_chapter(1, "Chapter 1", "x");
        let bytes = builder.build()?;
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let opf = read_entry(&mut zip, "OEBPS/content.opf");
        let ncx = read_entry(&mut zip, "OEBPS/toc.ncx");
        assert!(opf.contains(r#"<dc:identifier id="book-id">https://booktoki.example/novel/1</dc:identifier>"#));
        assert!(ncx.contains(r#"content="https://booktoki.example/novel/1""#));
        Ok(())
    }
}
