use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use upnp_archivable::{DiscoveredObject, Metadata, UPnPObject};
use crate::config::Config;
use crate::store::db::{BookmarkDb, Shape};
use crate::store::hash;

#[derive(Debug, Parser)]
#[command(name = "upnp-bookmarks", about = "Save and restore references to discovered UPnP devices")]
pub struct Cli {
    /// Config file (defaults to /etc/upnp-bookmarks/bookmarks.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Save a device or service reference
    Save {
        #[arg(long)]
        usn: String,
        /// Description document URL
        #[arg(long)]
        location: String,
        /// Annex entry as key=value; may be repeated
        #[arg(long = "meta", value_parser = parse_key_value)]
        meta: Vec<(String, String)>,
    },
    /// List saved bookmarks
    List {
        /// Only bookmarks of this device uuid
        #[arg(long)]
        device: Option<String>,
    },
    /// Print one bookmark as JSON
    Show { usn: String },
    /// Remove a bookmark
    Forget { usn: String },
    /// Remove bookmarks not saved recently
    Prune {
        /// Age in seconds; defaults to store.prune_after_secs
        #[arg(long)]
        older_than: Option<u64>,
    },
    /// Print a fingerprint of all stored bookmarks
    Fingerprint,
}

#[derive(Serialize)]
struct ShowView<'a> {
    usn: &'a str,
    description_url: &'a str,
    shape: Shape,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_tag: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_metadata: Option<&'a Metadata>,
    saved_at: String,
}

pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

pub fn run(command: Command, db: &BookmarkDb, config: &Config) -> Result<()> {
    match command {
        Command::Save { usn, location, meta } => {
            if usn.is_empty() {
                bail!("USN must not be empty");
            }
            let object = DiscoveredObject::new(usn, location);

            let changed = if meta.is_empty() {
                db.save_record(&object.archivable())?
            } else {
                let metadata: Metadata = meta.into_iter().collect();
                db.save_annex(&object.archivable_annex(Some(metadata)))?
            };

            tracing::info!("Saved {} (changed: {})", object.usn, changed);
        }
        Command::List { device } => {
            let bookmarks = match device {
                Some(uuid) => db.list_device(&uuid)?,
                None => db.list()?,
            };
            for bookmark in bookmarks {
                println!(
                    "{}\t{}\t{}",
                    bookmark.usn,
                    bookmark.shape.as_str(),
                    bookmark.location
                );
            }
        }
        Command::Show { usn } => {
            let bookmark = db
                .get(&usn)?
                .with_context(|| format!("No bookmark for {}", usn))?;

            // Typed payloads are opaque here; show their tag instead
            let annex = match bookmark.shape {
                Shape::TypedAnnex => None,
                Shape::Record | Shape::StringAnnex => db.load_annex(&usn)?,
            };
            let record = db
                .load_record(&usn)?
                .with_context(|| format!("No bookmark for {}", usn))?;

            let view = ShowView {
                usn: record.usn().as_str(),
                description_url: record.description_url(),
                shape: bookmark.shape,
                payload_tag: bookmark.payload_tag.as_deref(),
                custom_metadata: annex.as_ref().and_then(|a| a.custom_metadata()),
                saved_at: bookmark.saved_at.to_rfc3339(),
            };
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Command::Forget { usn } => {
            if db.forget(&usn)? {
                tracing::info!("Forgot {}", usn);
            } else {
                tracing::warn!("No bookmark for {}", usn);
            }
        }
        Command::Prune { older_than } => {
            let older_than = older_than.unwrap_or(config.store.prune_after_secs);
            let count = db.prune(older_than)?;
            tracing::info!("Pruned {} bookmarks older than {}s", count, older_than);
        }
        Command::Fingerprint => {
            let bookmarks = db.list()?;
            println!("{}", hash::store_fingerprint(&bookmarks));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_rejects_unknown_save_flag() {
        let result = Cli::try_parse_from([
            "upnp-bookmarks",
            "save",
            "--usn",
            "uuid:1",
            "--location",
            "http://h/d.xml",
            "--nt",
            "upnp:rootdevice",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("room=kitchen").unwrap(),
            ("room".to_string(), "kitchen".to_string())
        );
        assert_eq!(
            parse_key_value("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_key_value("empty=").unwrap().1, "");
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_cli_parses_save() {
        let cli = Cli::try_parse_from([
            "upnp-bookmarks",
            "save",
            "--usn",
            "uuid:1",
            "--location",
            "http://h/d.xml",
            "--meta",
            "room=kitchen",
        ])
        .unwrap();

        match cli.command {
            Command::Save { usn, location, meta } => {
                assert_eq!(usn, "uuid:1");
                assert_eq!(location, "http://h/d.xml");
                assert_eq!(meta, vec![("room".to_string(), "kitchen".to_string())]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_save_with_meta_stores_annex() {
        let db = BookmarkDb::open(":memory:").unwrap();
        let config = Config::default();

        run(
            Command::Save {
                usn: "uuid:1::upnp:rootdevice".to_string(),
                location: "http://h/d.xml".to_string(),
                meta: vec![("room".to_string(), "kitchen".to_string())],
            },
            &db,
            &config,
        )
        .unwrap();

        let annex = db.load_annex("uuid:1::upnp:rootdevice").unwrap().unwrap();
        assert_eq!(
            annex.custom_metadata().and_then(|m| m.get("room")).map(String::as_str),
            Some("kitchen")
        );
        assert_eq!(db.get("uuid:1::upnp:rootdevice").unwrap().unwrap().shape, Shape::StringAnnex);
    }

    #[test]
    fn test_save_without_meta_stores_record() {
        let db = BookmarkDb::open(":memory:").unwrap();

        run(
            Command::Save {
                usn: "uuid:2".to_string(),
                location: "http://h/e.xml".to_string(),
                meta: Vec::new(),
            },
            &db,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(db.get("uuid:2").unwrap().unwrap().shape, Shape::Record);
        assert!(run(Command::Show { usn: "uuid:2".to_string() }, &db, &Config::default()).is_ok());
        assert!(run(Command::Show { usn: "uuid:none".to_string() }, &db, &Config::default()).is_err());
    }
}
