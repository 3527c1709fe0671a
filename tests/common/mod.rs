//! Shared fakes for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use syllabot::config::Config;
use syllabot::embedding::{EmbeddingError, EmbeddingProvider};
use syllabot::llm::{ChatMessage, ChatModel, ChatModelFactory, GenerationParams, LlmError, Role};
use syllabot::{PipelineComponents, SourceDocument};

pub const EMBED_DIM: usize = 256;

/// Deterministic bag of character unigrams and bigrams, hashed into a
/// fixed number of buckets and L2-normalized
pub struct HashingEmbedder {
    pub batch_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
}

impl HashingEmbedder {
    pub fn new() -> Self {
        Self {
            batch_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; EMBED_DIM];
        let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();

        for c in &chars {
            v[bucket(&c.to_string())] += 1.0;
        }
        for pair in chars.windows(2) {
            let bigram: String = pair.iter().collect();
            v[bucket(&bigram)] += 1.0;
        }
        // Never a zero vector
        v[EMBED_DIM - 1] += 0.01;

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter().map(|x| x / norm).collect()
    }
}

fn bucket(feature: &str) -> usize {
    // FNV-1a
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in feature.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % (EMBED_DIM as u64 - 1)) as usize
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        EMBED_DIM
    }

    fn model_name(&self) -> &str {
        "hashing-test"
    }
}

/// Embedding service that is down
pub struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::GenerationError("service unavailable".to_string()))
    }

    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::GenerationError("service unavailable".to_string()))
    }

    fn dimension(&self) -> usize {
        EMBED_DIM
    }

    fn model_name(&self) -> &str {
        "failing-test"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Answer with the first passage of the supplied context
    EchoContext,
    /// Fail every request
    Fail,
    /// Produce no text
    Empty,
}

struct FakeChat {
    id: String,
    reply: Reply,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ChatModel for FakeChat {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.log.lock().unwrap().push(self.id.clone());

        match self.reply {
            Reply::Fail => Err(LlmError::Api {
                status: 503,
                body: "overloaded".to_string(),
            }),
            Reply::Empty => Err(LlmError::EmptyResponse),
            Reply::EchoContext => {
                let user = messages
                    .iter()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                let context = user.split("已知內容：\n").nth(1).unwrap_or_default();
                let first = context.split("\n\n").next().unwrap_or_default();
                Ok(format!("根據課綱：{}", first))
            }
        }
    }
}

/// Chat factory scripted per model id; unknown ids fail to initialize
pub struct FakeChatFactory {
    script: HashMap<String, Reply>,
    /// Model ids in the order they were invoked
    pub invocations: Arc<Mutex<Vec<String>>>,
}

impl FakeChatFactory {
    pub fn new(script: &[(&str, Reply)]) -> Self {
        Self {
            script: script
                .iter()
                .map(|(id, reply)| (id.to_string(), *reply))
                .collect(),
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Both default model ids answer from the context
    pub fn healthy() -> Self {
        let config = Config::default();
        Self::new(&[
            (config.llm.primary_model.as_str(), Reply::EchoContext),
            (config.llm.fallback_model.as_str(), Reply::EchoContext),
        ])
    }

    pub fn invoked(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }
}

impl ChatModelFactory for FakeChatFactory {
    fn create(&self, model: &str, _params: &GenerationParams) -> Result<Arc<dyn ChatModel>, LlmError> {
        let reply = self.script.get(model).ok_or_else(|| LlmError::Initialization {
            model: model.to_string(),
            message: "model not available".to_string(),
        })?;

        Ok(Arc::new(FakeChat {
            id: model.to_string(),
            reply: *reply,
            log: self.invocations.clone(),
        }))
    }
}

pub fn components(
    embedder: Arc<dyn EmbeddingProvider>,
    chat_factory: Arc<dyn ChatModelFactory>,
) -> PipelineComponents {
    PipelineComponents {
        embedder,
        chat_factory,
    }
}

/// Config pointing at `persist_dir`, with an API key-free LLM section
pub fn test_config(persist_dir: &Path) -> Config {
    let mut config = Config::default();
    config.index.persist_dir = persist_dir.to_path_buf();
    config
}

/// Ten-page course syllabus; the midterm deadline is on page 5
pub fn syllabus_pages() -> Vec<SourceDocument> {
    [
        "課程名稱：資料科學導論。授課老師：王老師。",
        "課程目標：學習資料分析與機器學習的基本概念。",
        "評分方式：作業百分之三十，出席百分之十，最終專題百分之六十。",
        "第一週至第四週：Python 基礎與資料處理。",
        "期中報告需於第 8 週前繳交，請以小組為單位完成。",
        "第九週至第十二週：監督式學習與模型評估。",
        "最終專題需於第 16 週發表。",
        "請假規定：請事先以電子郵件通知老師。",
        "參考書目：資料科學實戰，第二版。",
        "辦公室時間：每週三下午兩點至四點。",
    ]
    .iter()
    .enumerate()
    .map(|(i, text)| SourceDocument::new(i as u32 + 1, *text))
    .collect()
}

/// Write a PDF with one Helvetica text line per page
pub fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let lines = pages.iter().map(|text| Object::string_literal(*text)).collect();
    save_pdf(doc, font_id, lines, path);
}

/// Write a PDF whose text is shown through a Type0 font with Identity-H
/// encoding and a ToUnicode CMap, the way CJK documents are usually exported
pub fn write_cjk_pdf(path: &Path, pages: &[&str]) {
    let mut doc = Document::with_version("1.5");

    // CID n + 1 stands for the n-th distinct character
    let mut glyphs: Vec<char> = Vec::new();
    for c in pages.iter().flat_map(|text| text.chars()) {
        if !glyphs.contains(&c) {
            glyphs.push(c);
        }
    }
    let cid = |c: char| glyphs.iter().position(|g| *g == c).unwrap() as u16 + 1;

    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    for block in glyphs.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", block.len()));
        for c in block {
            cmap.push_str(&format!("<{:04X}> <{:04X}>\n", cid(*c), *c as u32));
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, cmap.into_bytes()));

    let descendant_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => "NotoSansTC-Regular",
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => "NotoSansTC-Regular",
            "Flags" => 4,
            "FontBBox" => vec![0.into(), (-120).into(), 1000.into(), 880.into()],
            "ItalicAngle" => 0,
            "Ascent" => 880,
            "Descent" => -120,
            "CapHeight" => 730,
            "StemV" => 80,
        },
        "DW" => 1000,
    });
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "NotoSansTC-Regular",
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![descendant_id.into()],
        "ToUnicode" => to_unicode_id,
    });

    let lines = pages
        .iter()
        .map(|text| {
            let codes: Vec<u8> = text.chars().flat_map(|c| cid(c).to_be_bytes()).collect();
            Object::String(codes, StringFormat::Hexadecimal)
        })
        .collect();
    save_pdf(doc, font_id, lines, path);
}

fn save_pdf(mut doc: Document, font_id: ObjectId, lines: Vec<Object>, path: &Path) {
    let pages_id = doc.new_object_id();
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for line in lines {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![line]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(path).unwrap();
}
