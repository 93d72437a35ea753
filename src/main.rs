use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use lessforge::{compile, CompileOptions, LessError};

/// LESS 编译器命令行入口。
#[derive(Parser, Debug)]
#[command(name = "lessforge")]
#[command(version)]
#[command(about = "把 LESS 源码编译成 CSS")]
struct Cli {
    /// 输入文件，`-` 表示从标准输入读取。
    input: String,
    /// 输出文件，缺省写到标准输出。
    #[arg(short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,
    /// 输出压缩后的 CSS。
    #[arg(short = 'x')]
    minify: bool,
    /// @import 检索目录，可重复。
    #[arg(long = "include-path", value_name = "DIR")]
    include_path: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("lessforge: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> Result<(), LessError> {
    let (source, current_dir) = read_input(&cli.input)?;

    let options = CompileOptions {
        minify: cli.minify,
        current_dir,
        include_paths: cli.include_path.clone(),
    };
    let css = compile(&source, options)?;

    match &cli.output {
        Some(path) => {
            fs::write(path, css)
                .map_err(|err| LessError::io(format!("写入 {} 失败: {err}", path.display())))?;
        }
        None => println!("{css}"),
    }
    Ok(())
}

fn read_input(input: &str) -> Result<(String, Option<PathBuf>), LessError> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|err| LessError::io(format!("读取标准输入失败: {err}")))?;
        return Ok((buffer, None));
    }
    let path = PathBuf::from(input);
    let source = fs::read_to_string(&path)
        .map_err(|err| LessError::io(format!("读取文件 {} 失败: {err}", path.display())))?;
    let current_dir = path.parent().map(|p| p.to_path_buf());
    Ok((source, current_dir))
}
