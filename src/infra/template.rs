//! 模板渲染
//!
//! test-config 模板使用 jinja 语法（minijinja 实现），开启
//! trim_blocks / lstrip_blocks 以兼容原 pipeline 的模板文件。

use minijinja::Environment;
use serde::Serialize;

use crate::error::Result;

/// 用扁平配置渲染模板文本
pub fn render<C: Serialize>(template: &str, config: &C) -> Result<String> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template("test-config", template)?;
    let tmpl = env.get_template("test-config")?;
    Ok(tmpl.render(config)?)
}
