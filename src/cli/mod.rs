//! CLI 모듈
//!
//! apidoc-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{EmbeddingBackend, RagConfig};
use crate::embedding::has_api_key;
use crate::knowledge::{
    DocumentType, KnowledgeExtractor, Metadata, MetadataFilter, MetadataValue, SearchHit,
};
use crate::service::{KnowledgeService, ServiceStats};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "apidoc-rag")]
#[command(version, about = "API 레퍼런스 지식베이스 (청킹 + 임베딩 + 유사도 검색)", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// 설정 덮어쓰기 플래그 (환경변수보다 우선)
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// 데이터 디렉토리
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// 지식 디렉토리 (api_docs.json, *.txt, *.md)
    #[arg(long, global = true)]
    pub knowledge_dir: Option<PathBuf>,

    /// 벡터 인덱스 디렉토리
    #[arg(long, global = true)]
    pub index_path: Option<PathBuf>,

    /// 컬렉션 이름
    #[arg(long, global = true)]
    pub collection: Option<String>,

    /// 임베딩 백엔드 (auto, gemini, hashing)
    #[arg(long, global = true)]
    pub embedding: Option<String>,

    /// 임베딩 차원
    #[arg(long, global = true)]
    pub dimension: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 지식베이스 초기화 (비어 있으면 인덱싱)
    Init,

    /// 컬렉션 삭제 후 전체 재인덱싱
    Rebuild {
        /// 지식 디렉토리를 다시 읽어 문서 집합 갱신
        #[arg(long)]
        reload: bool,
    },

    /// 유사도 검색
    Query {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// 최소 점수 (0.0 ~ 1.0)
        #[arg(short, long)]
        threshold: Option<f32>,

        /// 문서 종류 필터 (namespace, class, text, markdown)
        #[arg(long = "type", conflicts_with = "api")]
        doc_type: Option<String>,

        /// API 레퍼런스(namespace/class)만 검색
        #[arg(long)]
        api: bool,

        /// namespace 필터 (--api 와 함께)
        #[arg(long, requires = "api")]
        namespace: Option<String>,

        /// JSON 메타데이터 필터, 임의 키 가능 (예: '{"category": {"$in": ["bolts"]}}')
        #[arg(long, conflicts_with_all = ["doc_type", "api"])]
        filter: Option<String>,

        /// JSON 출력
        #[arg(long)]
        json: bool,
    },

    /// 메모리상 문서 키워드 검색
    Search {
        /// 찾을 문자열 (대소문자 무시)
        text: String,

        /// 문서 종류 필터
        #[arg(long = "type")]
        doc_type: Option<String>,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// 문서 추가
    Add(DocumentArgs),

    /// 문서 교체 (재임베딩)
    Update(DocumentArgs),

    /// 문서 삭제
    Delete {
        /// 삭제할 문서 ID
        id: String,
    },

    /// 상태 확인
    Stats {
        /// JSON 출력
        #[arg(long)]
        json: bool,
    },

    /// 추출 결과 미리보기 (인덱스에 쓰지 않음)
    Extract {
        /// 출력할 문서 수
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

/// 단건 문서 인자
#[derive(Args, Debug)]
pub struct DocumentArgs {
    /// 문서 ID
    pub id: String,

    /// 본문
    #[arg(short, long, conflicts_with = "file")]
    pub content: Option<String>,

    /// 본문을 읽을 파일
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// 문서 종류 (namespace, class, text, markdown)
    #[arg(long = "type", default_value = "text")]
    pub doc_type: String,

    /// 제목 (기본: ID)
    #[arg(long)]
    pub title: Option<String>,

    /// 출처
    #[arg(long, default_value = "cli")]
    pub source: String,

    #[arg(long)]
    pub namespace: Option<String>,

    #[arg(long)]
    pub class_name: Option<String>,

    /// 추가 메타데이터 (key=value, 반복 가능)
    #[arg(short, long = "meta")]
    pub meta: Vec<String>,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli.global)?;

    match cli.command {
        Commands::Init => cmd_init(config).await,
        Commands::Rebuild { reload } => cmd_rebuild(config, reload).await,
        Commands::Query {
            query,
            top_k,
            threshold,
            doc_type,
            api,
            namespace,
            filter,
            json,
        } => {
            let options = QueryOptions {
                top_k,
                threshold,
                doc_type,
                api,
                namespace,
                filter,
                json,
            };
            cmd_query(config, &query, options).await
        }
        Commands::Search {
            text,
            doc_type,
            limit,
        } => cmd_search(config, &text, doc_type, limit).await,
        Commands::Add(args) => cmd_upsert(config, args, false).await,
        Commands::Update(args) => cmd_upsert(config, args, true).await,
        Commands::Delete { id } => cmd_delete(config, &id).await,
        Commands::Stats { json } => cmd_stats(config, json).await,
        Commands::Extract { limit } => cmd_extract(config, limit).await,
    }
}

/// 기본값 → 환경변수 → 플래그
fn build_config(global: &GlobalArgs) -> Result<RagConfig> {
    let mut config = RagConfig::from_env().context("설정 로드 실패")?;

    if let Some(ref dir) = global.data_dir {
        let base = RagConfig::with_data_dir(dir);
        config.data_dir = base.data_dir;
        config.knowledge_dir = base.knowledge_dir;
        config.index_path = base.index_path;
    }
    if let Some(ref dir) = global.knowledge_dir {
        config.knowledge_dir = dir.clone();
    }
    if let Some(ref path) = global.index_path {
        config.index_path = path.clone();
    }
    if let Some(ref name) = global.collection {
        config.collection_name = name.clone();
    }
    if let Some(ref backend) = global.embedding {
        config.embedding = backend.parse::<EmbeddingBackend>()?;
    }
    if let Some(dim) = global.dimension {
        config.embedding_dimension = dim;
    }

    config.validate()?;
    Ok(config)
}

async fn open_service(config: RagConfig) -> Result<KnowledgeService> {
    if config.embedding == EmbeddingBackend::Gemini && !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }

    KnowledgeService::open(config)
        .await
        .context("지식베이스 초기화 실패")
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 초기화 명령어 (init)
async fn cmd_init(config: RagConfig) -> Result<()> {
    println!("[*] 지식 디렉토리: {}", config.knowledge_dir.display());
    println!("[*] 벡터 인덱스: {}", config.index_path.display());

    let service = open_service(config).await?;
    print_stats(&service.stats().await);
    service.shutdown().await;
    Ok(())
}

/// 재구축 명령어 (rebuild)
async fn cmd_rebuild(config: RagConfig, reload: bool) -> Result<()> {
    let service = open_service(config).await?;

    println!("[*] 컬렉션 재구축 중...");
    let report = service.rebuild(reload).await.context("재구축 실패")?;

    println!(
        "[OK] {} 문서 인덱싱 완료 ({} 배치, {:.2}초)",
        report.indexed,
        report.batches,
        report.elapsed.as_secs_f64()
    );
    println!(
        "     완료 시각: {}",
        report
            .finished_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

/// 검색 옵션
struct QueryOptions {
    top_k: Option<usize>,
    threshold: Option<f32>,
    doc_type: Option<String>,
    api: bool,
    namespace: Option<String>,
    filter: Option<String>,
    json: bool,
}

/// 검색 명령어 (query)
async fn cmd_query(config: RagConfig, query: &str, options: QueryOptions) -> Result<()> {
    let service = open_service(config).await?;

    let results = if options.api {
        service
            .query_api(query, options.namespace.as_deref(), options.top_k, options.threshold)
            .await
    } else if let Some(ref raw) = options.doc_type {
        let doc_type: DocumentType = raw.parse()?;
        service
            .query_by_type(query, doc_type, options.top_k, options.threshold)
            .await
    } else {
        let mut q = service.make_query(query);
        if let Some(k) = options.top_k {
            q = q.top_k(k);
        }
        if let Some(t) = options.threshold {
            q = q.threshold(t);
        }
        if let Some(ref raw) = options.filter {
            let value: serde_json::Value =
                serde_json::from_str(raw).context("--filter JSON 파싱 실패")?;
            q = q.filter(MetadataFilter::from_json(&value)?);
        }
        service.query(&q).await
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());
    for (i, hit) in results.iter().enumerate() {
        print_hit(i + 1, hit);
    }

    Ok(())
}

/// 키워드 검색 명령어 (search)
async fn cmd_search(
    config: RagConfig,
    text: &str,
    doc_type: Option<String>,
    limit: usize,
) -> Result<()> {
    let doc_type = doc_type.map(|t| t.parse::<DocumentType>()).transpose()?;
    let service = open_service(config).await?;

    let docs = service.search_documents(text, doc_type);
    if docs.is_empty() {
        println!("[!] '{}'를 포함한 문서가 없습니다.", text);
        return Ok(());
    }

    println!("[OK] 일치 문서 ({} 건):\n", docs.len());
    for doc in docs.iter().take(limit) {
        println!("  [{}] {}", doc.doc_type(), doc.id);
        println!("        제목: {}", truncate_text(&doc.title, 60));
        println!("        {}", truncate_text(&doc.content, 120));
        println!();
    }
    if docs.len() > limit {
        println!("  ... 외 {} 건", docs.len() - limit);
    }

    Ok(())
}

/// 추가/교체 명령어 (add, update)
async fn cmd_upsert(config: RagConfig, args: DocumentArgs, replace: bool) -> Result<()> {
    let content = match (&args.content, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("파일 읽기 실패: {}", path.display()))?,
        (None, None) => bail!("--content 또는 --file 중 하나를 지정해야 합니다"),
    };
    let metadata = document_metadata(&args)?;

    let service = open_service(config).await?;
    if replace {
        service
            .try_update_document(&args.id, &content, &metadata)
            .await
            .with_context(|| format!("문서 '{}' 교체 실패", args.id))?;
        println!("[OK] 문서 '{}' 교체됨", args.id);
    } else {
        service
            .try_add_document(&args.id, &content, &metadata)
            .await
            .with_context(|| format!("문서 '{}' 추가 실패", args.id))?;
        println!("[OK] 문서 '{}' 추가됨 ({} chars)", args.id, content.chars().count());
    }

    Ok(())
}

/// 삭제 명령어 (delete)
async fn cmd_delete(config: RagConfig, id: &str) -> Result<()> {
    let service = open_service(config).await?;

    let removed = service
        .try_delete_document(id)
        .await
        .context("문서 삭제 실패")?;

    if removed {
        println!("[OK] 문서 '{}' 삭제됨", id);
    } else {
        println!("[!] 삭제할 문서를 찾을 수 없습니다: {}", id);
    }
    Ok(())
}

/// 상태 명령어 (stats)
async fn cmd_stats(config: RagConfig, json: bool) -> Result<()> {
    if json {
        let service = open_service(config).await?;
        println!("{}", serde_json::to_string_pretty(&service.stats().await)?);
        return Ok(());
    }

    println!("apidoc-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] 지식 디렉토리: {}", config.knowledge_dir.display());

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정 (로컬 해싱 임베딩 사용)");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    match open_service(config).await {
        Ok(service) => print_stats(&service.stats().await),
        Err(e) => println!("[!] 지식베이스 열기 실패: {:#}", e),
    }

    Ok(())
}

/// 추출 미리보기 명령어 (extract)
async fn cmd_extract(config: RagConfig, limit: usize) -> Result<()> {
    let extractor = KnowledgeExtractor::from_config(&config);
    let report = tokio::task::spawn_blocking(move || extractor.extract_report())
        .await
        .context("추출 작업 실패")??;

    println!(
        "[OK] {} 문서 추출 ({} 소스)\n",
        report.documents.len(),
        report.files_processed
    );
    for doc_type in [
        DocumentType::Namespace,
        DocumentType::Class,
        DocumentType::Text,
        DocumentType::Markdown,
    ] {
        println!("     {:<10} {}", doc_type.as_str(), report.count_by_type(doc_type));
    }
    println!();

    for doc in report.documents.iter().take(limit) {
        println!(
            "  [{}] {} ({} chars)",
            doc.doc_type(),
            doc.id,
            doc.content.chars().count()
        );
    }
    if report.documents.len() > limit {
        println!("  ... 외 {} 건", report.documents.len() - limit);
    }

    for err in &report.skipped {
        println!("[!] 건너뜀: {}", err);
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn print_hit(rank: usize, hit: &SearchHit) {
    println!(
        "{}. [{}] [점수: {:.4}] {}",
        rank,
        hit.doc_type,
        hit.score,
        truncate_text(&hit.title, 60)
    );
    println!("   ID: {}", hit.id);
    println!("   출처: {}", hit.source);
    println!("   내용: {}", truncate_text(&hit.content, 200));
    println!();
}

fn print_stats(stats: &ServiceStats) {
    match stats {
        ServiceStats::Ready {
            document_count,
            collection_name,
            embedding_model,
        } => {
            println!("[OK] 컬렉션: {}", collection_name);
            println!("     인덱싱된 문서: {} 건", document_count);
            println!("     임베딩 모델: {}", embedding_model);
        }
        ServiceStats::NotReady => println!("[!] 지식베이스가 준비되지 않았습니다"),
    }
}

/// CLI 인자 → 문서 메타데이터
fn document_metadata(args: &DocumentArgs) -> Result<Metadata> {
    let doc_type: DocumentType = args.doc_type.parse()?;

    let mut metadata = Metadata::new();
    for pair in &args.meta {
        let (key, value) = parse_meta(pair)?;
        metadata.insert(key, value);
    }

    metadata.insert("type".to_string(), doc_type.as_str().into());
    metadata.insert("source".to_string(), args.source.clone().into());
    if let Some(ref title) = args.title {
        metadata.insert("title".to_string(), title.clone().into());
    }
    if let Some(ref ns) = args.namespace {
        metadata.insert("namespace".to_string(), ns.clone().into());
    }
    if let Some(ref class_name) = args.class_name {
        metadata.insert("class_name".to_string(), class_name.clone().into());
    }
    Ok(metadata)
}

/// `key=value` 파싱. 값은 JSON 스칼라로 읽히면 그 타입, 아니면 문자열
fn parse_meta(pair: &str) -> Result<(String, MetadataValue)> {
    let (key, raw) = pair
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("메타데이터는 key=value 형식이어야 합니다: {}", pair))?;

    let key = key.trim();
    if key.is_empty() {
        bail!("메타데이터 키가 비어 있습니다: {}", pair);
    }

    let value = serde_json::from_str::<MetadataValue>(raw)
        .unwrap_or_else(|_| MetadataValue::Text(raw.to_string()));
    Ok((key.to_string(), value))
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("Beam", 10), "Beam");
        assert_eq!(truncate_text("ContourPlate", 7), "Contour...");
        assert_eq!(truncate_text("Properties:\n- Name", 40), "Properties: - Name");
    }

    #[test]
    fn test_truncate_unicode() {
        let korean = "보 부재 생성 예제";
        assert_eq!(truncate_text(korean, 4), "보 부재...");
    }

    #[test]
    fn test_parse_meta() {
        assert_eq!(
            parse_meta("version=2025").unwrap(),
            ("version".to_string(), MetadataValue::Int(2025))
        );
        assert_eq!(
            parse_meta("draft=true").unwrap(),
            ("draft".to_string(), MetadataValue::Bool(true))
        );
        assert_eq!(
            parse_meta("author=kim").unwrap(),
            ("author".to_string(), MetadataValue::from("kim"))
        );
        assert!(parse_meta("novalue").is_err());
        assert!(parse_meta("=x").is_err());
    }

    #[test]
    fn test_cli_parses_query() {
        let cli = Cli::try_parse_from([
            "apidoc-rag",
            "--collection",
            "docs",
            "query",
            "create beam",
            "--api",
            "--namespace",
            "Tekla.Structures.Model",
            "-k",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.global.collection.as_deref(), Some("docs"));
        match cli.command {
            Commands::Query {
                query,
                top_k,
                api,
                namespace,
                ..
            } => {
                assert_eq!(query, "create beam");
                assert_eq!(top_k, Some(3));
                assert!(api);
                assert_eq!(namespace.as_deref(), Some("Tekla.Structures.Model"));
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_filter_conflicts_with_typed_queries() {
        let filter = r#"{"category": "bolts"}"#;
        for argv in [
            vec!["apidoc-rag", "query", "beam", "--filter", filter, "--api"],
            vec!["apidoc-rag", "query", "beam", "--filter", filter, "--type", "class"],
        ] {
            let err = Cli::try_parse_from(argv).err().unwrap();
            assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        }

        let cli = Cli::try_parse_from([
            "apidoc-rag",
            "query",
            "beam",
            "--filter",
            filter,
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Query { filter: Some(_), .. }));
    }

    #[test]
    fn test_document_metadata() {
        let cli = Cli::try_parse_from([
            "apidoc-rag",
            "add",
            "class_custom_Bolt",
            "--content",
            "Bolt group",
            "--type",
            "class",
            "--namespace",
            "Custom",
            "--class-name",
            "Bolt",
            "-m",
            "version=2",
        ])
        .unwrap();

        let Commands::Add(args) = cli.command else {
            panic!("expected add command");
        };
        let meta = document_metadata(&args).unwrap();
        assert_eq!(meta["type"], MetadataValue::from("class"));
        assert_eq!(meta["class_name"], MetadataValue::from("Bolt"));
        assert_eq!(meta["source"], MetadataValue::from("cli"));
        assert_eq!(meta["version"], MetadataValue::Int(2));
    }
}
