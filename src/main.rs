use odata_query::document::FindOptions;
use odata_query::sql_compiler::SqlCompiler;
use odata_query::{QueryConfig, QueryParser};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "odata_query.json";

/// 加载配置，失败时使用默认配置
fn load_config() -> QueryConfig {
    match QueryConfig::from_json_file(CONFIG_FILE) {
        Ok(config) => {
            println!("✅ 使用JSON配置文件: {}", CONFIG_FILE);
            for (entity, table) in &config.table_mapping {
                println!("  {} -> {}", entity, table);
            }
            config
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用默认配置", e);
            QueryConfig::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("--- OData Query: 查询字符串到过滤器 ---");
    println!("\n[配置信息]:");
    let config = load_config();

    let parser = QueryParser::from_config(&config)?;
    let compiler = SqlCompiler::from_config(&config);
    let mut entity = String::from("Item");

    println!("\n输入查询字符串，例如: $filter=name eq 'john' and age gt 18&$orderby=age desc&$top=10");
    println!("`:entity <名称>` 切换实体，`:quit` 退出\n");

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("odata> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                if line == ":quit" {
                    break;
                }
                if let Some(name) = line.strip_prefix(":entity ") {
                    entity = name.trim().to_string();
                    println!("当前实体: {}", entity);
                    continue;
                }

                run_query(&parser, &compiler, &entity, line)?;
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn run_query(parser: &QueryParser, compiler: &SqlCompiler, entity: &str, line: &str) -> anyhow::Result<()> {
    // 1. 解析查询字符串
    let descriptor = match parser.parse_query_string(line) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            println!("✗ 解析失败: {}", e);
            return Ok(());
        }
    };

    println!("[步骤 1]: 查询描述");
    if let Some(filter) = &descriptor.filter {
        println!("  $filter      {}", filter);
    }
    if let Some(select) = &descriptor.select {
        println!("  $select      {}", select.join(", "));
    }
    if let Some(orderby) = &descriptor.orderby {
        let items: Vec<_> = orderby.iter().map(|i| format!("{} {}", i.field, i.direction)).collect();
        println!("  $orderby     {}", items.join(", "));
    }
    if let Some(top) = descriptor.top {
        println!("  $top         {}", top);
    }
    if let Some(skip) = descriptor.skip {
        println!("  $skip        {}", skip);
    }
    println!("  $count       {}", descriptor.count);
    println!("  $inlinecount {}", descriptor.inline_count);

    // 2. 文档数据库查询
    println!("\n[步骤 2]: 文档查询");
    match FindOptions::from_descriptor(&descriptor) {
        Ok(options) => println!("{}", serde_json::to_string_pretty(&options)?),
        Err(e) => {
            println!("✗ 转换失败: {}", e);
            return Ok(());
        }
    }

    // 3. SQL
    println!("\n[步骤 3]: SQL");
    match compiler.compile(&descriptor, entity) {
        Ok(result) => {
            println!("{}", result.sql);
            for opt in &result.optimizations {
                println!("• {:?}", opt);
            }
        }
        Err(e) => println!("✗ SQL 编译失败: {}", e),
    }
    println!();

    Ok(())
}
