//! Jenkins job-definition XML for pipeline jobs.

use crate::escape;

/// Wrap a pipeline script in a `flow-definition` document.
///
/// The whole script is XML-escaped, so a parser reading the `<script>`
/// element gets the script back byte for byte.
pub fn job_definition_xml(script: &str) -> String {
    format!(
        r#"<?xml version='1.1' encoding='UTF-8'?>
<flow-definition plugin="workflow-job@2.40">
  <description></description>
  <keepDependencies>false</keepDependencies>
  <properties/>
  <definition class="org.jenkinsci.plugins.workflow.cps.CpsFlowDefinition" plugin="workflow-cps@2.87">
    <script>{}</script>
    <sandbox>true</sandbox>
  </definition>
  <triggers/>
  <disabled>false</disabled>
</flow-definition>"#,
        escape::xml(script)
    )
}
