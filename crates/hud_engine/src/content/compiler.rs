use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use thiserror::Error;

use crate::AppPaths;

use super::database::{DefRow, GameInfo};
use super::discovery::{discover_mod_sources, ContentRequest, DiscoveryError, ModSource};
use super::hashing::collect_xml_files;

const ROOT_ELEMENT: &str = "GameInfo";
const ROW_ELEMENT: &str = "Row";
const TYPE_ATTRIBUTE: &str = "Type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    Discovery,
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownElement,
    MissingField,
    DuplicateRowInMod,
}

/// A content failure, pinned to the mod and file (and position when known).
#[derive(Debug, Clone, Error)]
#[error("{code:?}: {message} (mod={mod_id}, file={}{})", .file_path.display(), at_suffix(.location))]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub mod_id: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

fn at_suffix(location: &Option<SourceLocation>) -> String {
    location
        .map(|at| format!(", line={}, column={}", at.line, at.column))
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
struct PendingRow {
    table: String,
    row: DefRow,
}

pub fn compile_game_info(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<GameInfo, ContentCompileError> {
    let sources = discover_mod_sources(app_paths, request)
        .map_err(|error| map_discovery_error(error, &app_paths.root))?;
    compile_sources(&sources)
}

pub(crate) fn compile_sources(sources: &[ModSource]) -> Result<GameInfo, ContentCompileError> {
    let mut game_info = GameInfo::new();

    for source in sources {
        let xml_files = collect_xml_files(&source.source_dir)
            .map_err(|error| map_discovery_error(error, &source.source_dir))?;
        let mut seen_in_mod = HashSet::<(String, String)>::new();

        for xml in &xml_files {
            let file = XmlFile {
                mod_id: &source.mod_id,
                path: &xml.abs_path,
            };
            let raw = fs::read_to_string(file.path).map_err(|err| {
                file.error(
                    ContentErrorCode::ReadFile,
                    format!("failed to read XML file: {err}"),
                    None,
                )
            })?;
            for pending in file.parse(&raw)? {
                if !seen_in_mod.insert((pending.table.clone(), pending.row.type_name.clone())) {
                    return Err(file.error(
                        ContentErrorCode::DuplicateRowInMod,
                        format!(
                            "{} row '{}' appears twice in mod '{}'",
                            pending.table, pending.row.type_name, source.mod_id
                        ),
                        None,
                    ));
                }
                // a later mod replaces an earlier mod's row
                game_info.insert_row(&pending.table, pending.row);
            }
        }
    }

    Ok(game_info)
}

/// One XML file being compiled; every error it raises names the mod and path.
#[derive(Clone, Copy)]
struct XmlFile<'a> {
    mod_id: &'a str,
    path: &'a Path,
}

impl XmlFile<'_> {
    fn error(
        self,
        code: ContentErrorCode,
        message: String,
        location: Option<SourceLocation>,
    ) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            mod_id: self.mod_id.to_string(),
            file_path: self.path.to_path_buf(),
            location,
        }
    }

    fn error_at(
        self,
        doc: &Document<'_>,
        node: Node<'_, '_>,
        code: ContentErrorCode,
        message: String,
    ) -> ContentCompileError {
        let pos = doc.text_pos_at(node.range().start);
        let location = SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        };
        self.error(code, message, Some(location))
    }

    fn parse(self, raw: &str) -> Result<Vec<PendingRow>, ContentCompileError> {
        let doc = Document::parse(raw).map_err(|err| {
            let pos = err.pos();
            self.error(
                ContentErrorCode::XmlMalformed,
                format!("malformed XML: {err}"),
                Some(SourceLocation {
                    line: pos.row as usize,
                    column: pos.col as usize,
                }),
            )
        })?;

        let root = doc.root_element();
        if root.tag_name().name() != ROOT_ELEMENT {
            return Err(self.error_at(
                &doc,
                root,
                ContentErrorCode::InvalidRoot,
                format!("root element must be <{ROOT_ELEMENT}>"),
            ));
        }

        let mut rows = Vec::new();
        for table in root.children().filter(Node::is_element) {
            let table_name = table.tag_name().name();
            for node in table.children().filter(Node::is_element) {
                let element = node.tag_name().name();
                if element != ROW_ELEMENT {
                    return Err(self.error_at(
                        &doc,
                        node,
                        ContentErrorCode::UnknownElement,
                        format!("<{table_name}> may only contain <{ROW_ELEMENT}>, found <{element}>"),
                    ));
                }
                rows.push(PendingRow {
                    table: table_name.to_string(),
                    row: self.parse_row(&doc, table_name, node)?,
                });
            }
        }
        Ok(rows)
    }

    fn parse_row(
        self,
        doc: &Document<'_>,
        table_name: &str,
        node: Node<'_, '_>,
    ) -> Result<DefRow, ContentCompileError> {
        let type_name = node.attribute(TYPE_ATTRIBUTE).map(str::trim).unwrap_or_default();
        if type_name.is_empty() {
            return Err(self.error_at(
                doc,
                node,
                ContentErrorCode::MissingField,
                format!("<{ROW_ELEMENT}> in <{table_name}> needs a {TYPE_ATTRIBUTE} attribute"),
            ));
        }
        Ok(node
            .attributes()
            .filter(|attribute| attribute.name() != TYPE_ATTRIBUTE)
            .fold(DefRow::new(type_name, self.mod_id), |row, attribute| {
                row.with_attribute(attribute.name(), attribute.value())
            }))
    }
}

pub(crate) fn map_discovery_error(error: DiscoveryError, root: &Path) -> ContentCompileError {
    match error {
        DiscoveryError::EnabledModMissing {
            mod_id,
            expected_dir,
        } => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: format!(
                "enabled mod '{}' not found at {}; check enabled mod list",
                mod_id,
                expected_dir.display()
            ),
            mod_id,
            file_path: expected_dir,
            location: None,
        },
        DiscoveryError::ReadFile { path, source } | DiscoveryError::ReadDir { path, source } => {
            ContentCompileError {
                code: ContentErrorCode::ReadFile,
                message: format!("failed to read content: {source}"),
                mod_id: "<discovery>".to_string(),
                file_path: path,
                location: None,
            }
        }
        other => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: other.to_string(),
            mod_id: "<discovery>".to_string(),
            file_path: root.to_path_buf(),
            location: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn setup_app_paths(root: &Path) -> AppPaths {
        let paths = AppPaths::under(root);
        fs::create_dir_all(&paths.base_content_dir).expect("base");
        fs::create_dir_all(&paths.mods_dir).expect("mods");
        paths
    }

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    #[test]
    fn rows_are_grouped_by_table_with_attributes() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(
            &app.base_content_dir.join("yields.xml"),
            r#"<GameInfo>
                <Yields>
                    <Row Type="YIELD_FOOD" Name="Food"/>
                    <Row Type="YIELD_GOLD" Name="Gold"/>
                </Yields>
                <UnhappinessEffects>
                    <Row Type="StandardCityTransferUnrest" Amount="10"/>
                </UnhappinessEffects>
            </GameInfo>"#,
        );

        let info = compile_game_info(&app, &ContentRequest::default()).expect("compile");

        assert_eq!(info.table("Yields").map(|t| t.len()), Some(2));
        let unrest = info
            .lookup("UnhappinessEffects", "StandardCityTransferUnrest")
            .expect("unrest row");
        assert_eq!(unrest.parse_attribute::<i32>("Amount"), Some(10));
        assert_eq!(unrest.attribute(TYPE_ATTRIBUTE), None);
    }

    #[test]
    fn later_mod_overrides_base_row() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(
            &app.base_content_dir.join("yields.xml"),
            r#"<GameInfo><Yields><Row Type="YIELD_FOOD" Name="Food"/></Yields></GameInfo>"#,
        );
        write_file(
            &app.mods_dir.join("harvest").join("yields.xml"),
            r#"<GameInfo><Yields><Row Type="YIELD_FOOD" Name="Harvest"/></Yields></GameInfo>"#,
        );
        let request = ContentRequest {
            enabled_mods: vec!["harvest".to_string()],
        };

        let info = compile_game_info(&app, &request).expect("compile");
        let food = info.lookup("Yields", "YIELD_FOOD").expect("food");
        assert_eq!(food.name(), Some("Harvest"));
        assert_eq!(food.mod_id, "harvest");
    }

    #[test]
    fn missing_type_reports_mod_file_and_location() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(
            &app.base_content_dir.join("defs.xml"),
            r#"<GameInfo><Yields><Row Name="Food"/></Yields></GameInfo>"#,
        );

        let err = compile_game_info(&app, &ContentRequest::default()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::MissingField);
        assert_eq!(err.mod_id, "base");
        assert!(err
            .file_path
            .ends_with(Path::new("assets").join("base").join("defs.xml")));
        assert!(err.location.is_some());
    }

    #[test]
    fn invalid_root_and_unknown_element_error() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(&app.base_content_dir.join("defs.xml"), r#"<Defs/>"#);
        let err = compile_game_info(&app, &ContentRequest::default()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidRoot);

        write_file(
            &app.base_content_dir.join("defs.xml"),
            r#"<GameInfo><Yields><Entry Type="YIELD_FOOD"/></Yields></GameInfo>"#,
        );
        let err = compile_game_info(&app, &ContentRequest::default()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownElement);
    }

    #[test]
    fn malformed_xml_reports_location() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(
            &app.base_content_dir.join("defs.xml"),
            r#"<GameInfo><Yields></GameInfo>"#,
        );
        let err = compile_game_info(&app, &ContentRequest::default()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn same_mod_duplicate_row_errors() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(
            &app.base_content_dir.join("a.xml"),
            r#"<GameInfo><Yields><Row Type="YIELD_FOOD"/></Yields></GameInfo>"#,
        );
        write_file(
            &app.base_content_dir.join("b.xml"),
            r#"<GameInfo><Yields><Row Type="YIELD_FOOD"/></Yields></GameInfo>"#,
        );
        let err = compile_game_info(&app, &ContentRequest::default()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateRowInMod);
    }

    #[test]
    fn same_type_in_different_tables_is_allowed() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(
            &app.base_content_dir.join("a.xml"),
            r#"<GameInfo>
                <Units><Row Type="SHARED"/></Units>
                <Constructibles><Row Type="SHARED"/></Constructibles>
            </GameInfo>"#,
        );
        let info = compile_game_info(&app, &ContentRequest::default()).expect("compile");
        assert_eq!(info.total_rows(), 2);
    }

    #[test]
    fn missing_enabled_mod_maps_to_discovery_error() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        let request = ContentRequest {
            enabled_mods: vec!["ghost".to_string()],
        };
        let err = compile_game_info(&app, &request).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::Discovery);
        assert_eq!(err.mod_id, "ghost");
    }
}
