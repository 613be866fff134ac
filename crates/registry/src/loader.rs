use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use models::{FragmentDef, StyleDef, TemplateDef};

/// A loaded template asset: parsed schema plus the outer shell source and
/// one inner source per declared fragment type.
#[derive(Debug, Clone)]
pub struct TemplateEntry {
    pub def: TemplateDef,
    pub shell_source: String,
    pub fragment_sources: BTreeMap<String, String>,
}

/// A standalone fragment asset, addressable by (group, fragment_id).
#[derive(Debug, Clone)]
pub struct FragmentEntry {
    pub def: FragmentDef,
    pub source: String,
}

/// A style asset: parsed schema plus its CSS.
#[derive(Debug, Clone)]
pub struct StyleEntry {
    pub def: StyleDef,
    pub css: String,
}

/// Registry holds the immutable per-kind catalogues built at startup by
/// scanning group-rooted asset directories. Reads are lock-free; the
/// catalogues never change after load.
#[derive(Debug, Default)]
pub struct Registry {
    templates: BTreeMap<(String, String), TemplateEntry>,
    fragments: BTreeMap<(String, String), FragmentEntry>,
    styles: BTreeMap<(String, String), StyleEntry>,
    default_styles: BTreeMap<String, String>,
}

impl Registry {
    /// Scan `<root>/{templates,fragments,styles}/<group>/<id>/` and build the
    /// catalogues. Assets whose schema disagrees with the directory they were
    /// loaded from are skipped with a warning; a missing root loads empty.
    pub fn load(root: &Path) -> anyhow::Result<Registry> {
        let mut registry = Registry::default();

        for (group, dir) in asset_dirs(&root.join("templates"))? {
            match load_template(&group, &dir) {
                Ok(entry) => {
                    tracing::info!(group, template_id = %entry.def.template_id, "loaded template");
                    registry.templates.insert(
                        (group.clone(), entry.def.template_id.clone()),
                        entry,
                    );
                }
                Err(error) => {
                    tracing::warn!(group, dir = %dir.display(), ?error, "skipping template asset");
                }
            }
        }

        for (group, dir) in asset_dirs(&root.join("fragments"))? {
            match load_fragment(&group, &dir) {
                Ok(entry) => {
                    tracing::info!(group, fragment_id = %entry.def.fragment_id, "loaded fragment");
                    registry.fragments.insert(
                        (group.clone(), entry.def.fragment_id.clone()),
                        entry,
                    );
                }
                Err(error) => {
                    tracing::warn!(group, dir = %dir.display(), ?error, "skipping fragment asset");
                }
            }
        }

        for (group, dir) in asset_dirs(&root.join("styles"))? {
            match load_style(&group, &dir) {
                Ok(entry) => {
                    tracing::info!(group, style_id = %entry.def.style_id, "loaded style");
                    if entry.def.default {
                        let prior = registry
                            .default_styles
                            .insert(group.clone(), entry.def.style_id.clone());
                        if let Some(prior) = prior {
                            tracing::warn!(
                                group,
                                prior,
                                chosen = %entry.def.style_id,
                                "multiple default styles declared for group"
                            );
                            // Sorted scan order: keep the first seen.
                            registry.default_styles.insert(group.clone(), prior);
                        }
                    }
                    registry
                        .styles
                        .insert((group.clone(), entry.def.style_id.clone()), entry);
                }
                Err(error) => {
                    tracing::warn!(group, dir = %dir.display(), ?error, "skipping style asset");
                }
            }
        }

        Ok(registry)
    }

    pub fn list_templates(&self, group: Option<&str>) -> Vec<&TemplateDef> {
        self.templates
            .iter()
            .filter(|((g, _), _)| group.map_or(true, |want| want == g))
            .map(|(_, entry)| &entry.def)
            .collect()
    }

    pub fn get_template(&self, group: &str, template_id: &str) -> Option<&TemplateEntry> {
        self.templates
            .get(&(group.to_string(), template_id.to_string()))
    }

    /// Discovery lookup: an explicit group wins; otherwise the first match in
    /// sorted (group, id) order.
    pub fn find_template(&self, template_id: &str, group: Option<&str>) -> Option<&TemplateEntry> {
        match group {
            Some(group) => self.get_template(group, template_id),
            None => self
                .templates
                .iter()
                .find(|((_, id), _)| id == template_id)
                .map(|(_, entry)| entry),
        }
    }

    pub fn list_fragments(&self, group: Option<&str>) -> Vec<&FragmentDef> {
        self.fragments
            .iter()
            .filter(|((g, _), _)| group.map_or(true, |want| want == g))
            .map(|(_, entry)| &entry.def)
            .collect()
    }

    pub fn get_fragment(&self, group: &str, fragment_id: &str) -> Option<&FragmentEntry> {
        self.fragments
            .get(&(group.to_string(), fragment_id.to_string()))
    }

    pub fn find_fragment(&self, fragment_id: &str, group: Option<&str>) -> Option<&FragmentEntry> {
        match group {
            Some(group) => self.get_fragment(group, fragment_id),
            None => self
                .fragments
                .iter()
                .find(|((_, id), _)| id == fragment_id)
                .map(|(_, entry)| entry),
        }
    }

    pub fn list_styles(&self, group: Option<&str>) -> Vec<&StyleDef> {
        self.styles
            .iter()
            .filter(|((g, _), _)| group.map_or(true, |want| want == g))
            .map(|(_, entry)| &entry.def)
            .collect()
    }

    pub fn get_style(&self, group: &str, style_id: &str) -> Option<&StyleEntry> {
        self.styles.get(&(group.to_string(), style_id.to_string()))
    }

    /// The style marked default for this group, if one was declared.
    pub fn default_style(&self, group: &str) -> Option<&StyleEntry> {
        let style_id = self.default_styles.get(group)?;
        self.get_style(group, style_id)
    }

    /// Every template entry, in sorted (group, id) order. Used to register
    /// template sources with the rendering engine at startup.
    pub fn template_entries(&self) -> impl Iterator<Item = &TemplateEntry> {
        self.templates.values()
    }
}

/// Yield `(group, asset_dir)` pairs under a kind root, in sorted order.
fn asset_dirs(kind_root: &Path) -> anyhow::Result<Vec<(String, std::path::PathBuf)>> {
    let mut out = Vec::new();
    if !kind_root.is_dir() {
        tracing::warn!(root = %kind_root.display(), "asset directory not found");
        return Ok(out);
    }

    let mut groups: Vec<_> = std::fs::read_dir(kind_root)
        .with_context(|| format!("reading {}", kind_root.display()))?
        .collect::<Result<_, _>>()?;
    groups.sort_by_key(|e| e.file_name());

    for group_entry in groups {
        if !group_entry.file_type()?.is_dir() {
            continue;
        }
        let group = group_entry.file_name().to_string_lossy().into_owned();

        let mut assets: Vec<_> = std::fs::read_dir(group_entry.path())
            .with_context(|| format!("reading {}", group_entry.path().display()))?
            .collect::<Result<_, _>>()?;
        assets.sort_by_key(|e| e.file_name());

        for asset_entry in assets {
            if asset_entry.file_type()?.is_dir() {
                out.push((group.clone(), asset_entry.path()));
            }
        }
    }
    Ok(out)
}

fn load_template(group: &str, dir: &Path) -> anyhow::Result<TemplateEntry> {
    let schema_path = dir.join("template.yaml");
    let raw = std::fs::read_to_string(&schema_path)
        .with_context(|| format!("reading {}", schema_path.display()))?;
    let def: TemplateDef = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing {}", schema_path.display()))?;

    let dir_id = dir_name(dir);
    anyhow::ensure!(
        def.group == group,
        "schema group {:?} does not match directory group {:?}",
        def.group,
        group,
    );
    anyhow::ensure!(
        def.template_id == dir_id,
        "schema template_id {:?} does not match directory {:?}",
        def.template_id,
        dir_id,
    );

    let shell_path = dir.join("shell.html");
    let shell_source = std::fs::read_to_string(&shell_path)
        .with_context(|| format!("reading {}", shell_path.display()))?;

    let mut fragment_sources = BTreeMap::new();
    for fragment in &def.fragments {
        let source_path = dir.join("fragments").join(format!("{}.html", fragment.fragment_id));
        let source = std::fs::read_to_string(&source_path)
            .with_context(|| format!("reading {}", source_path.display()))?;
        fragment_sources.insert(fragment.fragment_id.clone(), source);
    }

    Ok(TemplateEntry {
        def,
        shell_source,
        fragment_sources,
    })
}

fn load_fragment(group: &str, dir: &Path) -> anyhow::Result<FragmentEntry> {
    let schema_path = dir.join("fragment.yaml");
    let raw = std::fs::read_to_string(&schema_path)
        .with_context(|| format!("reading {}", schema_path.display()))?;
    let mut def: FragmentDef = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing {}", schema_path.display()))?;

    let dir_id = dir_name(dir);
    let schema_group = def.group.get_or_insert_with(|| group.to_string());
    anyhow::ensure!(
        schema_group == group,
        "schema group {:?} does not match directory group {:?}",
        schema_group,
        group,
    );
    anyhow::ensure!(
        def.fragment_id == dir_id,
        "schema fragment_id {:?} does not match directory {:?}",
        def.fragment_id,
        dir_id,
    );

    let source_path = dir.join("body.html");
    let source = std::fs::read_to_string(&source_path)
        .with_context(|| format!("reading {}", source_path.display()))?;

    Ok(FragmentEntry { def, source })
}

fn load_style(group: &str, dir: &Path) -> anyhow::Result<StyleEntry> {
    let schema_path = dir.join("style.yaml");
    let raw = std::fs::read_to_string(&schema_path)
        .with_context(|| format!("reading {}", schema_path.display()))?;
    let def: StyleDef = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing {}", schema_path.display()))?;

    let dir_id = dir_name(dir);
    anyhow::ensure!(
        def.group == group,
        "schema group {:?} does not match directory group {:?}",
        def.group,
        group,
    );
    anyhow::ensure!(
        def.style_id == dir_id,
        "schema style_id {:?} does not match directory {:?}",
        def.style_id,
        dir_id,
    );

    let css_path = dir.join("style.css");
    let css = std::fs::read_to_string(&css_path)
        .with_context(|| format!("reading {}", css_path.display()))?;

    Ok(StyleEntry { def, css })
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
