// src/package/apkg.rs

use super::{FIELDS, Package, PackageWriter, SORT_FIELD};
use crate::{error::*, utils};
use chrono::Utc;
use log::{debug, info};
use rusqlite::{Connection, params};
use serde_json::{Value, json};
use std::{
    fs::File,
    io::{self, Write},
    path::Path,
};
use tokio_util::sync::CancellationToken;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

const COLLECTION_FILE: &str = "collection.anki2";
const MEDIA_MAP_FILE: &str = "media";
const SCHEMA_VERSION: i64 = 11;
const DEFAULT_CONF_ID: i64 = 1;
const DEFAULT_DECK_ID: i64 = 1;

const SCHEMA: &str = r#"
CREATE TABLE col (
    id integer primary key, crt integer not null, mod integer not null,
    scm integer not null, ver integer not null, dty integer not null,
    usn integer not null, ls integer not null, conf text not null,
    models text not null, decks text not null, dconf text not null, tags text not null
);
CREATE TABLE notes (
    id integer primary key, guid text not null, mid integer not null,
    mod integer not null, usn integer not null, tags text not null,
    flds text not null, sfld integer not null, csum integer not null,
    flags integer not null, data text not null
);
CREATE TABLE cards (
    id integer primary key, nid integer not null, did integer not null,
    ord integer not null, mod integer not null, usn integer not null,
    type integer not null, queue integer not null, due integer not null,
    ivl integer not null, factor integer not null, reps integer not null,
    lapses integer not null, left integer not null, odue integer not null,
    odid integer not null, flags integer not null, data text not null
);
CREATE TABLE revlog (
    id integer primary key, cid integer not null, usn integer not null,
    ivl integer not null, lastIvl integer not null, factor integer not null,
    time integer not null, type integer not null
);
CREATE TABLE graves (usn integer not null, oid integer not null, type integer not null);
CREATE INDEX ix_notes_usn ON notes (usn);
CREATE INDEX ix_cards_usn ON cards (usn);
CREATE INDEX ix_revlog_usn ON revlog (usn);
CREATE INDEX ix_cards_nid ON cards (nid);
CREATE INDEX ix_cards_sched ON cards (did, queue, due);
CREATE INDEX ix_revlog_cid ON revlog (cid);
CREATE INDEX ix_notes_csum ON notes (csum);
"#;

/// 以 Anki 2.1 可导入的 `.apkg` 格式写出。
///
/// 先在临时目录生成 SQLite 集合，再与媒体文件一起打成 zip。zip 写到目标目录中的
/// 临时文件，完成后才重命名，所以失败或中断不会留下半成品。
#[derive(Debug, Default, Clone)]
pub struct ApkgWriter {
    cancellation_token: CancellationToken,
}

impl ApkgWriter {
    pub fn new(cancellation_token: CancellationToken) -> Self {
        Self { cancellation_token }
    }
}

impl PackageWriter for ApkgWriter {
    fn write(&self, package: &Package, dest: &Path) -> AppResult<()> {
        let work_dir = tempfile::tempdir()?;
        let db_path = work_dir.path().join(COLLECTION_FILE);
        write_collection(&db_path, package)?;

        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;
        let staging = tempfile::Builder::new()
            .prefix(".apkg-")
            .suffix(".part")
            .tempfile_in(parent)?;

        let mut zip = ZipWriter::new(staging.as_file());
        zip.start_file(COLLECTION_FILE, file_options(CompressionMethod::Deflated))?;
        io::copy(&mut File::open(&db_path)?, &mut zip)?;

        let mut media_map = serde_json::Map::new();
        for (index, path) in package.media_files.iter().enumerate() {
            let entry = index.to_string();
            // 媒体本身已经压缩过，直接存储
            zip.start_file(entry.as_str(), file_options(CompressionMethod::Stored))?;
            io::copy(&mut File::open(path)?, &mut zip)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            media_map.insert(entry, Value::String(name));
        }
        zip.start_file(MEDIA_MAP_FILE, file_options(CompressionMethod::Deflated))?;
        zip.write_all(serde_json::to_string(&media_map)?.as_bytes())?;
        zip.finish()?;

        staging.as_file().sync_all()?;
        if self.cancellation_token.is_cancelled() {
            debug!("打包被取消，放弃 {}", dest.display());
            return Err(AppError::UserInterrupt);
        }
        staging.persist(dest)?;
        info!(
            "写出 Anki 包: {} (笔记 {} 条, 媒体 {} 个)",
            dest.display(),
            package.note_count(),
            package.media_files.len()
        );
        Ok(())
    }
}

fn file_options(method: CompressionMethod) -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(method)
}

fn write_collection(db_path: &Path, package: &Package) -> AppResult<()> {
    let now = Utc::now();
    let now_secs = now.timestamp();
    let now_millis = now.timestamp_millis();

    let mut conn = Connection::open(db_path)?;
    conn.execute_batch(SCHEMA)?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO col VALUES (1, ?1, ?2, ?3, ?4, 0, 0, 0, ?5, ?6, ?7, ?8, '{}')",
        params![
            now_secs,
            now_millis,
            now_millis,
            SCHEMA_VERSION,
            collection_conf(package).to_string(),
            models_json(package, now_secs).to_string(),
            decks_json(package, now_secs).to_string(),
            dconf_json().to_string(),
        ],
    )?;

    // 毫秒时间戳作 id 的起点，逐条递增保证唯一
    let mut next_id = now_millis;
    let mut due = 0i64;
    {
        let mut insert_note = tx.prepare(
            "INSERT INTO notes VALUES (?1, ?2, ?3, ?4, -1, '', ?5, ?6, ?7, 0, '')",
        )?;
        let mut insert_card = tx.prepare(
            "INSERT INTO cards VALUES (?1, ?2, ?3, ?4, ?5, -1, 0, 0, ?6, 0, 0, 0, 0, 0, 0, 0, 0, '')",
        )?;
        for deck in &package.decks {
            for note in &deck.notes {
                let note_id = next_id;
                next_id += 1;
                due += 1;
                insert_note.execute(params![
                    note_id,
                    note.guid,
                    package.model.id,
                    now_secs,
                    note.fields.join("\x1f"),
                    note.sort_field(),
                    utils::field_checksum(note.first_field()),
                ])?;
                for ord in 0..package.model.templates.len() {
                    let card_id = next_id;
                    next_id += 1;
                    insert_card.execute(params![card_id, note_id, deck.id, ord as i64, now_secs, due])?;
                }
            }
        }
    }
    tx.commit()?;
    debug!("SQLite 集合写入完成: {}", db_path.display());
    Ok(())
}

fn collection_conf(package: &Package) -> Value {
    let first_deck = package.decks.first().map_or(DEFAULT_DECK_ID, |d| d.id);
    json!({
        "activeDecks": [first_deck],
        "curDeck": first_deck,
        "curModel": package.model.id.to_string(),
        "newSpread": 0,
        "collapseTime": 1200,
        "timeLim": 0,
        "estTimes": true,
        "dueCounts": true,
        "nextPos": 1,
        "sortType": "noteFld",
        "sortBackwards": false,
        "addToCur": true
    })
}

fn models_json(package: &Package, now_secs: i64) -> Value {
    let model = &package.model;
    let fields: Vec<Value> = FIELDS
        .iter()
        .enumerate()
        .map(|(ord, name)| {
            json!({
                "name": name,
                "ord": ord,
                "font": "Arial",
                "media": [],
                "rtl": false,
                "size": 20,
                "sticky": false
            })
        })
        .collect();
    let templates: Vec<Value> = model
        .templates
        .iter()
        .enumerate()
        .map(|(ord, t)| {
            json!({
                "name": t.name,
                "ord": ord,
                "qfmt": t.front,
                "afmt": t.back,
                "bqfmt": "",
                "bafmt": "",
                "did": null,
                "bfont": "",
                "bsize": 0
            })
        })
        .collect();
    let req: Vec<Value> = model
        .templates
        .iter()
        .enumerate()
        .map(|(ord, t)| json!([ord, "any", t.front_field_indices(&FIELDS)]))
        .collect();

    let mut models = serde_json::Map::new();
    models.insert(
        model.id.to_string(),
        json!({
            "id": model.id,
            "name": model.name,
            "type": 0,
            "mod": now_secs,
            "usn": -1,
            "sortf": SORT_FIELD,
            "did": package.decks.first().map_or(DEFAULT_DECK_ID, |d| d.id),
            "tmpls": templates,
            "flds": fields,
            "css": model.css,
            "latexPre": "\\documentclass[12pt]{article}\n\\special{papersize=3in,5in}\n\\usepackage{amssymb,amsmath}\n\\pagestyle{empty}\n\\setlength{\\parindent}{0in}\n\\begin{document}\n",
            "latexPost": "\\end{document}",
            "latexsvg": false,
            "req": req,
            "tags": [],
            "vers": []
        }),
    );
    Value::Object(models)
}

fn deck_json(id: i64, name: &str, now_secs: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "desc": "",
        "conf": DEFAULT_CONF_ID,
        "dyn": 0,
        "collapsed": false,
        "browserCollapsed": false,
        "extendNew": 10,
        "extendRev": 50,
        "mod": now_secs,
        "usn": -1,
        "newToday": [0, 0],
        "revToday": [0, 0],
        "lrnToday": [0, 0],
        "timeToday": [0, 0]
    })
}

fn decks_json(package: &Package, now_secs: i64) -> Value {
    let mut decks = serde_json::Map::new();
    decks.insert(
        DEFAULT_DECK_ID.to_string(),
        deck_json(DEFAULT_DECK_ID, "Default", now_secs),
    );
    for deck in &package.decks {
        decks.insert(deck.id.to_string(), deck_json(deck.id, &deck.name, now_secs));
    }
    Value::Object(decks)
}

fn dconf_json() -> Value {
    let conf = json!({
        "id": DEFAULT_CONF_ID,
        "name": "Default",
        "mod": 0,
        "usn": 0,
        "dyn": false,
        "autoplay": true,
        "replayq": true,
        "timer": 0,
        "maxTaken": 60,
        "new": {
            "bury": true,
            "delays": [1.0, 10.0],
            "initialFactor": 2500,
            "ints": [1, 4, 7],
            "order": 1,
            "perDay": 20,
            "separate": true
        },
        "lapse": {
            "delays": [10.0],
            "leechAction": 0,
            "leechFails": 8,
            "minInt": 1,
            "mult": 0.0
        },
        "rev": {
            "bury": true,
            "ease4": 1.3,
            "fuzz": 0.05,
            "ivlFct": 1.0,
            "maxIvl": 36500,
            "minSpace": 1,
            "perDay": 100
        }
    });
    let mut dconf = serde_json::Map::new();
    dconf.insert(DEFAULT_CONF_ID.to_string(), conf);
    Value::Object(dconf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        models::{Note, TemplateVariant},
        package::assemble_package,
    };
    use std::io::Read;

    fn sample_notes(dir: &Path) -> Vec<Note> {
        ["挨拶", "数字", "家族"]
            .iter()
            .enumerate()
            .flat_map(|(c, category)| {
                (0..2).map(move |i| {
                    let id = format!("s{}{}", c, i);
                    Note {
                        definition: format!("意味{}", id),
                        position: String::new(),
                        category: category.to_string(),
                        video_url: format!("https://cdn.example/{}.mp4", id),
                        page_url: format!("https://example/ja/signs/{}?sl=JSL", id),
                        raw_video_path: dir.join(format!("{}.raw.mp4", id)),
                        output_media_path: dir.join(format!("{}.webp", id)),
                        id,
                    }
                })
            })
            .collect()
    }

    #[test]
    fn test_apkg_contains_collection_and_media() {
        let dir = tempfile::tempdir().unwrap();
        let notes = sample_notes(dir.path());
        for note in &notes {
            std::fs::write(&note.output_media_path, b"RIFFxxxxWEBP").unwrap();
        }
        let config = AppConfig {
            template_variant: TemplateVariant::Both,
            ..Default::default()
        };
        let package = assemble_package(&notes, &config);
        let dest = dir.path().join("out").join("deck.apkg");
        ApkgWriter::default().write(&package, &dest).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut media = String::new();
        archive
            .by_name(MEDIA_MAP_FILE)
            .unwrap()
            .read_to_string(&mut media)
            .unwrap();
        let media: serde_json::Map<String, Value> = serde_json::from_str(&media).unwrap();
        assert_eq!(media.len(), 6);
        assert_eq!(media["0"], "s00.webp");
        assert!(archive.by_name("5").is_ok());

        let db_path = dir.path().join("extracted.anki2");
        io::copy(
            &mut archive.by_name(COLLECTION_FILE).unwrap(),
            &mut File::create(&db_path).unwrap(),
        )
        .unwrap();
        let conn = Connection::open(&db_path).unwrap();
        let notes: i64 = conn.query_row("SELECT count(*) FROM notes", [], |r| r.get(0)).unwrap();
        let cards: i64 = conn.query_row("SELECT count(*) FROM cards", [], |r| r.get(0)).unwrap();
        assert_eq!(notes, 6);
        assert_eq!(cards, 12);

        let decks: String = conn.query_row("SELECT decks FROM col", [], |r| r.get(0)).unwrap();
        let decks: serde_json::Map<String, Value> = serde_json::from_str(&decks).unwrap();
        assert_eq!(decks.len(), 4);
        assert!(decks.values().any(|d| d["name"] == "手話タウンハンドブック::家族"));

        // 临时文件已被重命名，目录中只剩最终产物
        let leftovers: Vec<_> = std::fs::read_dir(dest.parent().unwrap()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_cancelled_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let package = assemble_package(&sample_notes(dir.path()), &AppConfig::default());
        let token = CancellationToken::new();
        token.cancel();
        let dest = dir.path().join("deck.apkg");
        let err = ApkgWriter::new(token).write(&package, &dest).unwrap_err();
        assert!(err.is_interrupt());
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_note_fields_are_joined_with_unit_separator() {
        let dir = tempfile::tempdir().unwrap();
        let notes = sample_notes(dir.path());
        let package = assemble_package(&notes[..1], &AppConfig::default());
        let db_path = dir.path().join("c.anki2");
        write_collection(&db_path, &package).unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let (flds, sfld, csum): (String, String, i64) = conn
            .query_row("SELECT flds, sfld, csum FROM notes", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .unwrap();
        assert_eq!(flds.split('\x1f').count(), FIELDS.len());
        assert_eq!(sfld, "意味s00");
        assert_eq!(csum, utils::field_checksum("s00"));
    }
}
